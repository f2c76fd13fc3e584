use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use cinebook_core::models::{
    Genre, Movie, MovieUpdate, NewMovie, NewShowtime, SeatAvailability, Showtime,
};
use cinebook_core::CoreError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::extract::{Json, Path, Query};
use crate::{error::AppError, state::AppState};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListMoviesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListShowtimesQuery {
    /// `YYYY-MM-DD`; without it only upcoming showtimes are listed.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShowtimeRequest {
    pub movie_id: i32,
    pub start_time: DateTime<Utc>,
    pub price_cents: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/genres", get(list_genres))
        .route("/movies", get(list_movies))
        .route("/movies/{id}", get(get_movie))
        .route("/showtimes", get(list_showtimes))
        .route("/showtimes/{id}", get(get_showtime))
        .route("/showtimes/{id}/seats", get(list_seats_for_showtime))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", post(create_movie))
        .route("/movies/{id}", put(update_movie).delete(delete_movie))
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/{id}", delete(delete_showtime))
}

// ============================================================================
// Genres & Movies
// ============================================================================

async fn list_genres(State(state): State<AppState>) -> Result<Json<Vec<Genre>>, AppError> {
    let genres = state.catalog.list_genres().await.map_err(CoreError::from)?;
    Ok(Json(genres))
}

async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<ListMoviesQuery>,
) -> Result<Json<Vec<Movie>>, AppError> {
    let (limit, offset) = page_window(query.page, query.limit)?;
    let movies = state
        .catalog
        .list_movies(limit, offset)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(movies))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<i32>,
) -> Result<Json<Movie>, AppError> {
    positive_id(movie_id as i64, "movie")?;
    let movie = state.catalog.get_movie(movie_id).await.map_err(CoreError::from)?;
    Ok(Json(movie))
}

async fn create_movie(
    State(state): State<AppState>,
    Json(req): Json<NewMovie>,
) -> Result<(StatusCode, Json<Movie>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::ValidationError("title is required".to_string()));
    }
    positive_id(req.genre_id as i64, "genre")?;

    let movie = state.catalog.create_movie(&req).await.map_err(CoreError::from)?;
    tracing::info!("Created movie {} ({})", movie.movie_id, movie.title);

    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<i32>,
    Json(req): Json<MovieUpdate>,
) -> Result<Json<Movie>, AppError> {
    positive_id(movie_id as i64, "movie")?;
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::ValidationError("title cannot be blank".to_string()));
    }
    if let Some(genre_id) = req.genre_id {
        positive_id(genre_id as i64, "genre")?;
    }

    let movie = state
        .catalog
        .update_movie(movie_id, &req)
        .await
        .map_err(CoreError::from)?;
    tracing::info!("Updated movie {} ({})", movie.movie_id, movie.title);

    Ok(Json(movie))
}

async fn delete_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    positive_id(movie_id as i64, "movie")?;
    state.catalog.delete_movie(movie_id).await.map_err(CoreError::from)?;
    Ok(Json(json!({ "message": "movie deleted" })))
}

// ============================================================================
// Showtimes & Seats
// ============================================================================

async fn create_showtime(
    State(state): State<AppState>,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<(StatusCode, Json<Showtime>), AppError> {
    positive_id(req.movie_id as i64, "movie")?;
    if req.start_time <= Utc::now() {
        return Err(AppError::ValidationError(
            "start_time cannot be in the past".to_string(),
        ));
    }
    if req.price_cents <= 0 {
        return Err(AppError::ValidationError("price must be positive".to_string()));
    }

    let showtime = state
        .catalog
        .create_showtime(&NewShowtime {
            movie_id: req.movie_id,
            start_time: req.start_time,
            price_cents: req.price_cents,
        })
        .await
        .map_err(CoreError::from)?;

    Ok((StatusCode::CREATED, Json(showtime)))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<i32>,
) -> Result<Json<Showtime>, AppError> {
    positive_id(showtime_id as i64, "showtime")?;
    let showtime = state
        .catalog
        .get_showtime(showtime_id)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(showtime))
}

async fn list_showtimes(
    State(state): State<AppState>,
    Query(query): Query<ListShowtimesQuery>,
) -> Result<Json<Vec<Showtime>>, AppError> {
    let (start, end) = showtime_window(query.date.as_deref(), Utc::now())?;
    let showtimes = state
        .catalog
        .list_showtimes_between(start, end)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(showtimes))
}

async fn delete_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    positive_id(showtime_id as i64, "showtime")?;
    state
        .catalog
        .delete_showtime(showtime_id)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(json!({ "message": "showtime deleted" })))
}

/// Seat map keyed by row number.
async fn list_seats_for_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<i32>,
) -> Result<Json<BTreeMap<i32, Vec<SeatAvailability>>>, AppError> {
    positive_id(showtime_id as i64, "showtime")?;
    let seats = state
        .catalog
        .list_seats_for_showtime(showtime_id)
        .await
        .map_err(CoreError::from)?;

    let mut rows: BTreeMap<i32, Vec<SeatAvailability>> = BTreeMap::new();
    for seat in seats {
        rows.entry(seat.row).or_default().push(seat);
    }
    Ok(Json(rows))
}

// ============================================================================
// Helpers
// ============================================================================

fn positive_id(id: i64, what: &str) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::ValidationError(format!("invalid {what} id")));
    }
    Ok(())
}

fn page_window(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page < 1 {
        return Err(AppError::ValidationError("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::ValidationError(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let offset = page
        .checked_sub(1)
        .and_then(|p| p.checked_mul(limit))
        .ok_or_else(|| AppError::ValidationError("page out of range".to_string()))?;

    Ok((limit, offset))
}

/// Half-open `[start, end)` window: one UTC day for a date, otherwise `now` onward.
fn showtime_window(
    date: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    match date {
        None | Some("") => {
            let end = NaiveDate::from_ymd_opt(9999, 12, 31)
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(|t| t.and_utc())
                .ok_or_else(|| AppError::InternalServerError("invalid far-future bound".to_string()))?;
            Ok((now, end))
        }
        Some(raw) => {
            let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::ValidationError("invalid date format, use YYYY-MM-DD".to_string())
            })?;
            let start = day
                .and_hms_opt(0, 0, 0)
                .map(|t| t.and_utc())
                .ok_or_else(|| AppError::ValidationError("invalid date".to_string()))?;
            Ok((start, start + Duration::days(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None, None).unwrap(), (50, 0));
        assert_eq!(page_window(Some(3), Some(10)).unwrap(), (10, 20));
        assert!(page_window(Some(0), None).is_err());
        assert!(page_window(None, Some(0)).is_err());
        assert!(page_window(None, Some(101)).is_err());
        assert!(matches!(
            page_window(Some(i64::MAX), Some(100)),
            Err(AppError::ValidationError(msg)) if msg == "page out of range"
        ));
        assert_eq!(page_window(Some(i64::MAX), Some(1)).unwrap(), (1, i64::MAX - 1));
    }

    #[test]
    fn test_showtime_window_for_a_day() {
        let now = Utc::now();
        let (start, end) = showtime_window(Some("2025-05-01"), now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_showtime_window_defaults_to_upcoming() {
        let now = Utc::now();
        let (start, end) = showtime_window(None, now).unwrap();
        assert_eq!(start, now);
        assert!(end > now + Duration::days(365));
        assert!(showtime_window(Some("05/01/2025"), now).is_err());
    }
}
