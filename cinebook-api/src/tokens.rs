use axum::{extract::State, routing::post, Router};
use cinebook_booking::RenewedAccessToken;
use serde::Deserialize;

use crate::extract::Json;
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RenewAccessTokenRequest {
    pub refresh_token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/tokens/renew_access", post(renew_access_token))
}

async fn renew_access_token(
    State(state): State<AppState>,
    Json(req): Json<RenewAccessTokenRequest>,
) -> Result<Json<RenewedAccessToken>, AppError> {
    if req.refresh_token.is_empty() {
        return Err(AppError::ValidationError("refresh_token is required".to_string()));
    }

    let renewed = state.sessions.renew_access_token(&req.refresh_token).await?;
    Ok(Json(renewed))
}
