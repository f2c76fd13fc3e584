use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Extension, Router,
};
use cinebook_core::models::Reservation;
use cinebook_core::token::Payload;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::{Json, Path};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ReserveSeatsRequest {
    pub showtime_id: i32,
    pub seat_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReserveSeatsResponse {
    pub reservations: Vec<Reservation>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations).post(reserve_seats))
        .route("/reservations/{id}", delete(cancel_reservation))
}

async fn reserve_seats(
    State(state): State<AppState>,
    Extension(auth): Extension<Payload>,
    Json(req): Json<ReserveSeatsRequest>,
) -> Result<(StatusCode, Json<ReserveSeatsResponse>), AppError> {
    let reservations = state
        .booking
        .reserve_seats(auth.user_id, req.showtime_id, &req.seat_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(ReserveSeatsResponse { reservations })))
}

async fn list_reservations(
    State(state): State<AppState>,
    Extension(auth): Extension<Payload>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let reservations = state.booking.list_reservations(auth.user_id).await?;
    Ok(Json(reservations))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<Payload>,
    Path(reservation_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .booking
        .cancel_reservation(reservation_id, auth.user_id)
        .await?;

    Ok(Json(json!({ "message": "reservation cancelled" })))
}
