use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Genre, Movie, MovieUpdate, NewMovie, NewReservation, NewSession, NewShowtime, NewUser, Reservation,
    SeatAvailability, Session, Showtime, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Insert collided with a uniqueness constraint; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One open storage transaction over the seat and reservation tables.
///
/// Dropping a transaction without calling [`ReservationTx::commit`] discards
/// every write made through it.
#[async_trait]
pub trait ReservationTx: Send {
    /// Seat IDs with no reservation for the showtime, as seen by this transaction.
    async fn list_available_seats(&mut self, showtime_id: i32) -> Result<Vec<i32>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] if (showtime, seat) is already taken.
    async fn insert_reservation(
        &mut self,
        reservation: &NewReservation,
    ) -> Result<Reservation, StoreError>;

    /// Deletes only when the row is owned by `user_id`. Returns rows affected.
    async fn delete_reservation(
        &mut self,
        reservation_id: i64,
        user_id: i64,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Transactional data access for the booking engine
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError>;

    async fn list_reservations_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Reservation>, StoreError>;
}

/// Repository trait for refresh-token sessions
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &NewSession) -> Result<Session, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Session, StoreError>;
}

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn get_user(&self, user_id: i64) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;
}

/// Repository trait for movies, genres, showtimes and the seat map
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_genres(&self) -> Result<Vec<Genre>, StoreError>;

    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError>;

    async fn get_movie(&self, movie_id: i32) -> Result<Movie, StoreError>;

    async fn create_movie(&self, movie: &NewMovie) -> Result<Movie, StoreError>;

    /// `NotFound("movie")` for an unknown movie, `NotFound("genre")` for an unknown genre.
    async fn update_movie(&self, movie_id: i32, update: &MovieUpdate) -> Result<Movie, StoreError>;

    async fn delete_movie(&self, movie_id: i32) -> Result<(), StoreError>;

    async fn get_showtime(&self, showtime_id: i32) -> Result<Showtime, StoreError>;

    async fn create_showtime(&self, showtime: &NewShowtime) -> Result<Showtime, StoreError>;

    /// Showtimes starting in `[start, end)`, earliest first.
    async fn list_showtimes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, StoreError>;

    async fn delete_showtime(&self, showtime_id: i32) -> Result<(), StoreError>;

    async fn list_seats_for_showtime(
        &self,
        showtime_id: i32,
    ) -> Result<Vec<SeatAvailability>, StoreError>;
}
