//! Signed, time-bounded identity tokens.
//!
//! Access and refresh tokens share one format: an HS256 JWT whose claims
//! mirror [`Payload`]. The refresh token's `id` doubles as the key of the
//! server-side session row.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Required length of the symmetric signing key, in bytes.
pub const KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("invalid key size: must be exactly {KEY_SIZE} bytes, got {0}")]
    InvalidKeySize(usize),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Identity carried by a token. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    pub id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    /// Fresh payload with a random v4 token ID. Times are truncated to whole
    /// seconds so they survive the JWT round trip unchanged.
    pub fn new(
        username: &str,
        user_id: i64,
        role: Role,
        duration: Duration,
    ) -> Result<Self, TokenError> {
        let issued_at = Utc::now().trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(duration)
            .ok_or_else(|| TokenError::Signing("token duration out of range".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            username: username.to_string(),
            role,
            issued_at,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Issues and verifies tokens
pub trait TokenMaker: Send + Sync {
    fn create_token(
        &self,
        username: &str,
        user_id: i64,
        role: Role,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError>;

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: Uuid,
    sub: String,
    username: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// HS256 token maker. Built once at startup from the configured key.
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtMaker {
    pub fn new(symmetric_key: &str) -> Result<Self, TokenError> {
        if symmetric_key.len() != KEY_SIZE {
            return Err(TokenError::InvalidKeySize(symmetric_key.len()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token is dead the second after `exp`.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(symmetric_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(symmetric_key.as_bytes()),
            validation,
        })
    }
}

impl TokenMaker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        user_id: i64,
        role: Role,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(username, user_id, role, duration)?;

        let claims = Claims {
            jti: payload.id,
            sub: payload.user_id.to_string(),
            username: payload.username.clone(),
            role: payload.role,
            iat: payload.issued_at.timestamp(),
            exp: payload.expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        let claims = data.claims;
        let user_id = claims.sub.parse::<i64>().map_err(|_| TokenError::Invalid)?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;

        Ok(Payload {
            id: claims.jti,
            user_id,
            username: claims.username,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn maker() -> JwtMaker {
        JwtMaker::new(KEY).unwrap()
    }

    #[test]
    fn test_create_and_verify_token() {
        let maker = maker();
        let (token, issued) = maker
            .create_token("alice", 42, Role::Customer, Duration::minutes(15))
            .unwrap();
        assert!(!token.is_empty());

        let verified = maker.verify_token(&token).unwrap();
        assert_eq!(verified, issued);
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.username, "alice");
        assert_eq!(verified.role, Role::Customer);
        assert_eq!(verified.expires_at - verified.issued_at, Duration::minutes(15));
    }

    #[test]
    fn test_expired_token() {
        let maker = maker();
        let (token, payload) = maker
            .create_token("alice", 42, Role::Customer, -Duration::minutes(1))
            .unwrap();
        assert!(payload.is_expired_at(Utc::now()));

        assert_eq!(maker.verify_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let maker = maker();
        let (token, _) = maker
            .create_token("alice", 42, Role::Customer, Duration::minutes(15))
            .unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_claims = parts[1].chars().rev().collect::<String>();
        parts[1] = &forged_claims;
        let forged = parts.join(".");

        assert_eq!(maker.verify_token(&forged), Err(TokenError::Invalid));
        assert_eq!(maker.verify_token("not-a-token"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_token_signed_with_other_key_is_invalid() {
        let other = JwtMaker::new("ffffffffffffffffffffffffffffffff").unwrap();
        let (token, _) = other
            .create_token("mallory", 7, Role::Admin, Duration::minutes(15))
            .unwrap();

        assert_eq!(maker().verify_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_key_must_be_exact_size() {
        assert!(matches!(
            JwtMaker::new("too-short"),
            Err(TokenError::InvalidKeySize(9))
        ));
    }

    #[test]
    fn test_token_ids_are_unique() {
        let maker = maker();
        let (_, a) = maker
            .create_token("alice", 42, Role::Customer, Duration::minutes(15))
            .unwrap();
        let (_, b) = maker
            .create_token("alice", 42, Role::Customer, Duration::minutes(15))
            .unwrap();
        assert_ne!(a.id, b.id);
    }
}
