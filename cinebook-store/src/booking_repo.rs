use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use cinebook_core::models::{NewReservation, Reservation};
use cinebook_core::repository::{BookingStore, ReservationTx, StoreError};

use crate::db_error;

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationRow {
    reservation_id: i64,
    user_id: i64,
    showtime_id: i32,
    seat_id: i32,
    reserved_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            reservation_id: row.reservation_id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            seat_id: row.seat_id,
            reserved_at: row.reserved_at,
        }
    }
}

/// Postgres transaction; sqlx rolls it back if it is dropped uncommitted.
pub struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgReservationTx { tx }))
    }

    async fn list_reservations_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT reservation_id, user_id, showtime_id, seat_id, reserved_at
            FROM reservations
            WHERE user_id = $1
            ORDER BY reserved_at DESC, reservation_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn list_available_seats(&mut self, showtime_id: i32) -> Result<Vec<i32>, StoreError> {
        // Joining the showtime makes an unknown showtime come back with no seats.
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT s.seat_id
            FROM seats s
            JOIN showtimes st ON st.showtime_id = $1
            WHERE NOT EXISTS (
                SELECT 1 FROM reservations r
                WHERE r.showtime_id = $1 AND r.seat_id = s.seat_id
            )
            ORDER BY s.seat_id
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn insert_reservation(
        &mut self,
        reservation: &NewReservation,
    ) -> Result<Reservation, StoreError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            INSERT INTO reservations (user_id, showtime_id, seat_id)
            VALUES ($1, $2, $3)
            RETURNING reservation_id, user_id, showtime_id, seat_id, reserved_at
            "#,
        )
        .bind(reservation.user_id)
        .bind(reservation.showtime_id)
        .bind(reservation.seat_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn delete_reservation(
        &mut self,
        reservation_id: i64,
        user_id: i64,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE reservation_id = $1 AND user_id = $2")
            .bind(reservation_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_error)
    }
}
