use std::collections::HashSet;
use std::sync::Arc;

use cinebook_core::models::{NewReservation, Reservation};
use cinebook_core::repository::{BookingStore, ReservationTx, StoreError};
use cinebook_core::{CoreError, CoreResult};
use tracing::{info, warn};

/// Runs seat reservations and cancellations, one storage transaction per call.
///
/// Availability is always read from storage inside the transaction; nothing is
/// cached here. The uniqueness constraint on (showtime, seat) is what actually
/// keeps two users off the same seat; the availability check only lets the
/// common conflict fail early with a precise error.
///
/// Dropping a returned future before it resolves drops the open transaction,
/// which rolls back every insert made so far.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Reserve every seat in `seat_ids` for `user_id`, or none of them.
    ///
    /// Reservations come back in the same order as `seat_ids`.
    pub async fn reserve_seats(
        &self,
        user_id: i64,
        showtime_id: i32,
        seat_ids: &[i32],
    ) -> CoreResult<Vec<Reservation>> {
        validate_selection(showtime_id, seat_ids)?;

        let mut tx = self.store.begin().await?;

        match reserve_in_tx(tx.as_mut(), user_id, showtime_id, seat_ids).await {
            Ok(reservations) => {
                tx.commit().await?;
                info!(
                    "Reserved {} seat(s) for user {} on showtime {}",
                    reservations.len(),
                    user_id,
                    showtime_id
                );
                Ok(reservations)
            }
            Err(err) => {
                if err.is_seat_conflict() {
                    warn!("Reservation for user {} rejected: {}", user_id, err);
                }
                Err(abort(tx, err).await)
            }
        }
    }

    /// Delete a reservation owned by `user_id`.
    ///
    /// A missing reservation and one owned by someone else both fail with
    /// `NotFound`; callers cannot tell the two apart.
    pub async fn cancel_reservation(&self, reservation_id: i64, user_id: i64) -> CoreResult<()> {
        if reservation_id <= 0 {
            return Err(CoreError::Validation("invalid reservation id".to_string()));
        }

        let mut tx = self.store.begin().await?;

        let affected = match tx.delete_reservation(reservation_id, user_id).await {
            Ok(n) => n,
            Err(e) => return Err(abort(tx, e.into()).await),
        };

        if affected == 0 {
            return Err(abort(tx, CoreError::NotFound("reservation".to_string())).await);
        }

        tx.commit().await?;
        info!("Reservation {} cancelled by user {}", reservation_id, user_id);
        Ok(())
    }

    /// Reservations held by `user_id`, newest first.
    pub async fn list_reservations(&self, user_id: i64) -> CoreResult<Vec<Reservation>> {
        Ok(self.store.list_reservations_by_user(user_id).await?)
    }
}

fn validate_selection(showtime_id: i32, seat_ids: &[i32]) -> CoreResult<()> {
    if showtime_id <= 0 {
        return Err(CoreError::Validation("invalid showtime id".to_string()));
    }
    if seat_ids.is_empty() {
        return Err(CoreError::Validation("at least one seat is required".to_string()));
    }

    let mut seen = HashSet::with_capacity(seat_ids.len());
    for &seat_id in seat_ids {
        if seat_id <= 0 {
            return Err(CoreError::Validation(format!("invalid seat id {seat_id}")));
        }
        if !seen.insert(seat_id) {
            return Err(CoreError::Validation(format!("duplicate seat id {seat_id}")));
        }
    }
    Ok(())
}

async fn reserve_in_tx(
    tx: &mut dyn ReservationTx,
    user_id: i64,
    showtime_id: i32,
    seat_ids: &[i32],
) -> CoreResult<Vec<Reservation>> {
    let available: HashSet<i32> = tx
        .list_available_seats(showtime_id)
        .await?
        .into_iter()
        .collect();

    if let Some(&seat_id) = seat_ids.iter().find(|id| !available.contains(id)) {
        return Err(CoreError::SeatUnavailable {
            seat_id,
            showtime_id,
        });
    }

    let mut reservations = Vec::with_capacity(seat_ids.len());
    for &seat_id in seat_ids {
        let new = NewReservation {
            user_id,
            showtime_id,
            seat_id,
        };
        // A concurrent transaction committed this seat after our availability read.
        let reservation = tx.insert_reservation(&new).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => CoreError::SeatAlreadyReserved { seat_id },
            other => other.into(),
        })?;
        reservations.push(reservation);
    }

    Ok(reservations)
}

/// Roll back and hand back the error that caused it.
async fn abort(tx: Box<dyn ReservationTx>, err: CoreError) -> CoreError {
    if let Err(rb_err) = tx.rollback().await {
        warn!("Rollback failed after '{}': {}", err, rb_err);
        return CoreError::Storage(format!("{err}; rollback failed: {rb_err}"));
    }
    err
}
