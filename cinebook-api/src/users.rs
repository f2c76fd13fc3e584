use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use cinebook_booking::IssuedSession;
use cinebook_core::models::{NewUser, Role, User};
use cinebook_core::repository::StoreError;
use cinebook_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::extract::{Json, Path};
use crate::middleware::ClientMeta;
use crate::password::{self, MIN_PASSWORD_LENGTH};
use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginUserRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginUserResponse {
    #[serde(flatten)]
    pub session: IssuedSession,
    pub user: UserResponse,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/login", post(login_user))
}

/// Routes that sit behind bearer authentication.
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/users/{user_id}", get(get_user))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    validate_new_user(&req)?;

    let hashed_password = password::hash_password(&req.password)
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))?;

    let user = state
        .users
        .create_user(&NewUser {
            name: req.name,
            username: req.username,
            email: req.email,
            hashed_password,
            role: Role::Customer,
        })
        .await
        .map_err(CoreError::from)?;

    tracing::info!("Created user {} ({})", user.user_id, user.username);

    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login_user(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<LoginUserRequest>,
) -> Result<Json<LoginUserResponse>, AppError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::ValidationError("email and password are required".to_string()));
    }

    let user = match state.users.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => return Err(CoreError::InvalidCredentials.into()),
        Err(e) => return Err(CoreError::from(e).into()),
    };

    let matches = password::verify_password(&req.password, &user.hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Stored hash unreadable: {}", e)))?;
    if !matches {
        return Err(CoreError::InvalidCredentials.into());
    }

    let session = state.sessions.login(&user, client).await?;

    Ok(Json(LoginUserResponse {
        session,
        user: user.into(),
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    if user_id <= 0 {
        return Err(AppError::ValidationError("invalid user id".to_string()));
    }

    let user = state.users.get_user(user_id).await.map_err(CoreError::from)?;
    Ok(Json(user.into()))
}

fn validate_new_user(req: &CreateUserRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::ValidationError("name is required".to_string()));
    }
    if req.username.is_empty() || !req.username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::ValidationError(
            "username must be non-empty and alphanumeric".to_string(),
        ));
    }
    if !is_plausible_email(&req.email) {
        return Err(AppError::ValidationError("invalid email".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Ada".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_validate_new_user() {
        assert!(validate_new_user(&request("ada", "ada@email.com", "secret")).is_ok());
        assert!(validate_new_user(&request("ada lovelace", "ada@email.com", "secret")).is_err());
        assert!(validate_new_user(&request("ada", "ada.email.com", "secret")).is_err());
        assert!(validate_new_user(&request("ada", "ada@email", "secret")).is_err());
        assert!(validate_new_user(&request("ada", "ada@email.com", "short")).is_err());
    }
}
