//! In-process store with the same transactional behaviour as the Postgres one.
//!
//! Reads see committed rows plus the reader's own uncommitted writes. Inserts
//! claim the (showtime, seat) key immediately, so a second transaction
//! inserting the same key gets a unique violation right away instead of
//! waiting on a lock the way Postgres would. Dropping a transaction without
//! committing releases everything it claimed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cinebook_core::models::{
    Genre, Movie, MovieUpdate, NewMovie, NewReservation, NewSession, NewShowtime, NewUser, Reservation, Seat,
    SeatAvailability, Session, Showtime, User,
};
use cinebook_core::repository::{
    BookingStore, CatalogRepository, ReservationTx, SessionRepository, StoreError, UserRepository,
};

const RESERVATION_KEY: &str = "reservations_showtime_seat_key";

const GENRES: [&str; 10] = [
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Horror",
    "Romance",
    "Science Fiction",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Committed(i64),
    Pending(u64),
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    genres: Vec<Genre>,
    movies: BTreeMap<i32, Movie>,
    showtimes: BTreeMap<i32, Showtime>,
    seats: Vec<Seat>,
    reservations: BTreeMap<i64, Reservation>,
    /// Unique index over (showtime, seat).
    claims: HashMap<(i32, i32), Claim>,
    /// Committed reservations an open transaction has deleted, by transaction.
    delete_locks: HashMap<i64, u64>,
    sessions: HashMap<Uuid, Session>,
    next_user_id: i64,
    next_movie_id: i32,
    next_showtime_id: i32,
    next_reservation_id: i64,
    next_tx_id: u64,
}

impl MemoryState {
    fn seat_available_to(&self, tx_id: u64, deleted: &[i64], key: (i32, i32)) -> bool {
        match self.claims.get(&key) {
            None => true,
            Some(Claim::Pending(owner)) => *owner != tx_id,
            Some(Claim::Committed(id)) => deleted.contains(id),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Empty store: no genres, seats, or rows of any kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the stock genres and a 5 x 10 venue layout, like a freshly migrated database.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap_or_else(|e| e.into_inner());
            state.genres = GENRES
                .iter()
                .enumerate()
                .map(|(i, name)| Genre {
                    genre_id: i as i32 + 1,
                    name: name.to_string(),
                })
                .collect();

            for row in 1..=5 {
                for number in 1..=10 {
                    let seat_id = (row - 1) * 10 + number;
                    state.seats.push(Seat {
                        seat_id,
                        row,
                        number,
                    });
                }
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

pub struct MemoryTx {
    id: u64,
    state: Arc<Mutex<MemoryState>>,
    inserted: Vec<Reservation>,
    deleted: Vec<i64>,
    finished: bool,
}

impl MemoryTx {
    /// Give back every key and row lock this transaction holds.
    fn release(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for r in self.inserted.drain(..) {
            let key = (r.showtime_id, r.seat_id);
            if state.claims.get(&key) == Some(&Claim::Pending(self.id)) {
                state.claims.remove(&key);
            }
        }
        for id in self.deleted.drain(..) {
            state.delete_locks.remove(&id);
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl ReservationTx for MemoryTx {
    async fn list_available_seats(&mut self, showtime_id: i32) -> Result<Vec<i32>, StoreError> {
        let state = lock_state(&self.state)?;
        if !state.showtimes.contains_key(&showtime_id) {
            return Ok(Vec::new());
        }

        Ok(state
            .seats
            .iter()
            .filter(|s| state.seat_available_to(self.id, &self.deleted, (showtime_id, s.seat_id)))
            .map(|s| s.seat_id)
            .collect())
    }

    async fn insert_reservation(
        &mut self,
        reservation: &NewReservation,
    ) -> Result<Reservation, StoreError> {
        let mut state = lock_state(&self.state)?;
        let key = (reservation.showtime_id, reservation.seat_id);

        let free = match state.claims.get(&key) {
            None => true,
            // Re-inserting a key this transaction already deleted is allowed.
            Some(Claim::Committed(id)) => self.deleted.contains(id),
            Some(Claim::Pending(_)) => false,
        };
        if !free {
            return Err(StoreError::UniqueViolation(RESERVATION_KEY.to_string()));
        }

        state.next_reservation_id += 1;
        let created = Reservation {
            reservation_id: state.next_reservation_id,
            user_id: reservation.user_id,
            showtime_id: reservation.showtime_id,
            seat_id: reservation.seat_id,
            reserved_at: Utc::now(),
        };
        state.claims.insert(key, Claim::Pending(self.id));
        drop(state);

        self.inserted.push(created.clone());
        Ok(created)
    }

    async fn delete_reservation(
        &mut self,
        reservation_id: i64,
        user_id: i64,
    ) -> Result<u64, StoreError> {
        let mut state = lock_state(&self.state)?;

        if let Some(pos) = self
            .inserted
            .iter()
            .position(|r| r.reservation_id == reservation_id && r.user_id == user_id)
        {
            let r = self.inserted.remove(pos);
            state.claims.remove(&(r.showtime_id, r.seat_id));
            return Ok(1);
        }

        if self.deleted.contains(&reservation_id) {
            return Ok(0);
        }

        let owned = state
            .reservations
            .get(&reservation_id)
            .is_some_and(|r| r.user_id == user_id);
        // A row another transaction is already deleting counts as gone.
        if !owned || state.delete_locks.contains_key(&reservation_id) {
            return Ok(0);
        }

        state.delete_locks.insert(reservation_id, self.id);
        drop(state);

        self.deleted.push(reservation_id);
        Ok(1)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let state_handle = self.state.clone();
        let mut state = lock_state(&state_handle)?;

        // Mirrors the showtimes foreign key: the showtime may have been deleted while this was open.
        if let Some(r) = self
            .inserted
            .iter()
            .find(|r| !state.showtimes.contains_key(&r.showtime_id))
        {
            return Err(StoreError::Backend(format!(
                "showtime {} no longer exists",
                r.showtime_id
            )));
        }

        for id in self.deleted.drain(..) {
            state.delete_locks.remove(&id);
            if let Some(r) = state.reservations.remove(&id) {
                let key = (r.showtime_id, r.seat_id);
                if state.claims.get(&key) == Some(&Claim::Committed(id)) {
                    state.claims.remove(&key);
                }
            }
        }
        for r in self.inserted.drain(..) {
            state
                .claims
                .insert((r.showtime_id, r.seat_id), Claim::Committed(r.reservation_id));
            state.reservations.insert(r.reservation_id, r);
        }

        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.release();
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let id = {
            let mut state = self.lock()?;
            state.next_tx_id += 1;
            state.next_tx_id
        };

        Ok(Box::new(MemoryTx {
            id,
            state: self.state.clone(),
            inserted: Vec::new(),
            deleted: Vec::new(),
            finished: false,
        }))
    }

    async fn list_reservations_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Reservation>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .reservations
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: &NewSession) -> Result<Session, StoreError> {
        let mut state = self.lock()?;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::UniqueViolation("sessions_pkey".to_string()));
        }

        let created = Session {
            id: session.id,
            username: session.username.clone(),
            refresh_token: session.refresh_token.clone(),
            user_agent: session.user_agent.clone(),
            client_ip: session.client_ip.clone(),
            is_blocked: session.is_blocked,
            expires_at: session.expires_at,
            created_at: Utc::now(),
        };
        state.sessions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, StoreError> {
        self.lock()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("session".to_string()))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        state.next_user_id += 1;
        let created = User {
            user_id: state.next_user_id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            hashed_password: user.hashed_password.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(created.user_id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, user_id: i64) -> Result<User, StoreError> {
        self.lock()?
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_genres(&self) -> Result<Vec<Genre>, StoreError> {
        Ok(self.lock()?.genres.clone())
    }

    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .movies
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_movie(&self, movie_id: i32) -> Result<Movie, StoreError> {
        self.lock()?
            .movies
            .get(&movie_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("movie".to_string()))
    }

    async fn create_movie(&self, movie: &NewMovie) -> Result<Movie, StoreError> {
        let mut state = self.lock()?;
        if !state.genres.iter().any(|g| g.genre_id == movie.genre_id) {
            return Err(StoreError::NotFound("genre".to_string()));
        }

        state.next_movie_id += 1;
        let created = Movie {
            movie_id: state.next_movie_id,
            title: movie.title.clone(),
            description: movie.description.clone(),
            poster_url: movie.poster_url.clone(),
            genre_id: movie.genre_id,
            created_at: Utc::now(),
        };
        state.movies.insert(created.movie_id, created.clone());
        Ok(created)
    }

    async fn update_movie(&self, movie_id: i32, update: &MovieUpdate) -> Result<Movie, StoreError> {
        let mut state = self.lock()?;
        if let Some(genre_id) = update.genre_id {
            if !state.genres.iter().any(|g| g.genre_id == genre_id) {
                return Err(StoreError::NotFound("genre".to_string()));
            }
        }

        let movie = state
            .movies
            .get_mut(&movie_id)
            .ok_or_else(|| StoreError::NotFound("movie".to_string()))?;
        if let Some(title) = &update.title {
            movie.title = title.clone();
        }
        if let Some(description) = &update.description {
            movie.description = description.clone();
        }
        if let Some(poster_url) = &update.poster_url {
            movie.poster_url = Some(poster_url.clone());
        }
        if let Some(genre_id) = update.genre_id {
            movie.genre_id = genre_id;
        }
        Ok(movie.clone())
    }

    async fn delete_movie(&self, movie_id: i32) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.movies.remove(&movie_id).is_none() {
            return Err(StoreError::NotFound("movie".to_string()));
        }

        let orphaned: Vec<i32> = state
            .showtimes
            .values()
            .filter(|s| s.movie_id == movie_id)
            .map(|s| s.showtime_id)
            .collect();
        for showtime_id in orphaned {
            remove_showtime(&mut state, showtime_id);
        }
        Ok(())
    }

    async fn get_showtime(&self, showtime_id: i32) -> Result<Showtime, StoreError> {
        self.lock()?
            .showtimes
            .get(&showtime_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("showtime".to_string()))
    }

    async fn create_showtime(&self, showtime: &NewShowtime) -> Result<Showtime, StoreError> {
        let mut state = self.lock()?;
        if !state.movies.contains_key(&showtime.movie_id) {
            return Err(StoreError::NotFound("movie".to_string()));
        }

        state.next_showtime_id += 1;
        let created = Showtime {
            showtime_id: state.next_showtime_id,
            movie_id: showtime.movie_id,
            start_time: showtime.start_time,
            price_cents: showtime.price_cents,
            created_at: Utc::now(),
        };
        state.showtimes.insert(created.showtime_id, created.clone());
        Ok(created)
    }

    async fn list_showtimes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, StoreError> {
        let state = self.lock()?;
        let mut showtimes: Vec<Showtime> = state
            .showtimes
            .values()
            .filter(|s| s.start_time >= start && s.start_time < end)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| s.start_time);
        Ok(showtimes)
    }

    async fn delete_showtime(&self, showtime_id: i32) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.showtimes.contains_key(&showtime_id) {
            return Err(StoreError::NotFound("showtime".to_string()));
        }
        remove_showtime(&mut state, showtime_id);
        Ok(())
    }

    async fn list_seats_for_showtime(
        &self,
        showtime_id: i32,
    ) -> Result<Vec<SeatAvailability>, StoreError> {
        let state = self.lock()?;
        if !state.showtimes.contains_key(&showtime_id) {
            return Err(StoreError::NotFound("showtime".to_string()));
        }

        Ok(state
            .seats
            .iter()
            .map(|s| SeatAvailability {
                seat_id: s.seat_id,
                row: s.row,
                number: s.number,
                is_reserved: matches!(
                    state.claims.get(&(showtime_id, s.seat_id)),
                    Some(Claim::Committed(_))
                ),
            })
            .collect())
    }
}

/// Drop a showtime and its committed reservations.
fn remove_showtime(state: &mut MemoryState, showtime_id: i32) {
    state.showtimes.remove(&showtime_id);
    state.reservations.retain(|_, r| r.showtime_id != showtime_id);
    state
        .claims
        .retain(|(showtime, _), claim| *showtime != showtime_id || matches!(claim, Claim::Pending(_)));
}
