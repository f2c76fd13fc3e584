use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cinebook_core::models::{NewSession, User};
use cinebook_core::repository::{SessionRepository, StoreError};
use cinebook_core::token::TokenMaker;
use cinebook_core::{CoreError, CoreResult};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub access_token_duration: Duration,
    pub refresh_token_duration: Duration,
}

/// Caller metadata recorded on the session at login.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: String,
    pub client_ip: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewedAccessToken {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Issues token pairs at login and mints access tokens from refresh tokens.
///
/// Renewal only ever reads the session row.
pub struct SessionManager {
    tokens: Arc<dyn TokenMaker>,
    sessions: Arc<dyn SessionRepository>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        tokens: Arc<dyn TokenMaker>,
        sessions: Arc<dyn SessionRepository>,
        config: SessionConfig,
    ) -> Self {
        Self {
            tokens,
            sessions,
            config,
        }
    }

    /// Start a session for a user whose credentials the caller already checked.
    pub async fn login(&self, user: &User, client: ClientInfo) -> CoreResult<IssuedSession> {
        let (access_token, access_payload) = self.tokens.create_token(
            &user.username,
            user.user_id,
            user.role,
            self.config.access_token_duration,
        )?;

        let (refresh_token, refresh_payload) = self.tokens.create_token(
            &user.username,
            user.user_id,
            user.role,
            self.config.refresh_token_duration,
        )?;

        let session = self
            .sessions
            .create_session(&NewSession {
                id: refresh_payload.id,
                username: user.username.clone(),
                refresh_token: refresh_token.clone(),
                user_agent: client.user_agent,
                client_ip: client.client_ip,
                is_blocked: false,
                expires_at: refresh_payload.expires_at,
            })
            .await?;

        info!("Session {} started for {}", session.id, user.username);

        Ok(IssuedSession {
            session_id: session.id,
            access_token,
            access_token_expires_at: access_payload.expires_at,
            refresh_token,
            refresh_token_expires_at: refresh_payload.expires_at,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// token signature and expiry, session exists, session not blocked,
    /// session user matches, stored token matches, session not expired.
    pub async fn renew_access_token(&self, refresh_token: &str) -> CoreResult<RenewedAccessToken> {
        let payload = self.tokens.verify_token(refresh_token)?;

        let session = self
            .sessions
            .get_session(payload.id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => CoreError::NotFound("session".to_string()),
                other => other.into(),
            })?;

        if session.is_blocked {
            warn!("Refresh denied: session {} is blocked", session.id);
            return Err(CoreError::SessionBlocked);
        }

        if session.username != payload.username {
            warn!("Refresh denied: session {} belongs to another user", session.id);
            return Err(CoreError::SessionUserMismatch);
        }

        if session.refresh_token != refresh_token {
            warn!("Refresh denied: session {} holds a different token", session.id);
            return Err(CoreError::TokenMismatch);
        }

        if Utc::now() > session.expires_at {
            warn!("Refresh denied: session {} expired", session.id);
            return Err(CoreError::SessionExpired);
        }

        let (access_token, access_payload) = self.tokens.create_token(
            &payload.username,
            payload.user_id,
            payload.role,
            self.config.access_token_duration,
        )?;

        Ok(RenewedAccessToken {
            access_token,
            access_token_expires_at: access_payload.expires_at,
        })
    }
}
