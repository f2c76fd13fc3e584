use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use cinebook_core::models::Role;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Bearer Authentication
// ============================================================================

/// Verify the bearer token, stash its payload in the request extensions, then
/// check the token's role against the roles the route accepts.
async fn authorize(
    state: &AppState,
    mut req: Request,
    next: Next,
    accessible_roles: &[Role],
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| {
            AppError::AuthenticationError("authorization header is not provided".to_string())
        })?;

    let payload = state
        .tokens
        .verify_token(header.token())
        .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    if !accessible_roles.contains(&payload.role) {
        tracing::warn!("{} denied access to {}", payload.username, req.uri().path());
        return Err(AppError::AuthorizationError("permission denied".to_string()));
    }

    req.extensions_mut().insert(payload);

    Ok(next.run(req).await)
}

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Admin, Role::Customer]).await
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Admin]).await
}
