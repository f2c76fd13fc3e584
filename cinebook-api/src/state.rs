use std::sync::Arc;
use std::time::Duration;

use cinebook_booking::{BookingEngine, SessionConfig, SessionManager};
use cinebook_core::repository::{
    BookingStore, CatalogRepository, SessionRepository, UserRepository,
};
use cinebook_core::token::TokenMaker;
use cinebook_store::{
    DbClient, MemoryStore, PgBookingStore, PgCatalogRepository, PgSessionRepository,
    PgUserRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub booking: Arc<BookingEngine>,
    pub sessions: Arc<SessionManager>,
    pub tokens: Arc<dyn TokenMaker>,
    pub request_timeout: Duration,
}

impl AppState {
    fn assemble(
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        bookings: Arc<dyn BookingStore>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<dyn TokenMaker>,
        session_config: SessionConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            users,
            catalog,
            booking: Arc::new(BookingEngine::new(bookings)),
            sessions: Arc::new(SessionManager::new(tokens.clone(), sessions, session_config)),
            tokens,
            request_timeout,
        }
    }

    /// State backed by Postgres repositories sharing one pool.
    pub fn postgres(
        db: &DbClient,
        tokens: Arc<dyn TokenMaker>,
        session_config: SessionConfig,
        request_timeout: Duration,
    ) -> Self {
        Self::assemble(
            Arc::new(PgUserRepository::new(db.pool.clone())),
            Arc::new(PgCatalogRepository::new(db.pool.clone())),
            Arc::new(PgBookingStore::new(db.pool.clone())),
            Arc::new(PgSessionRepository::new(db.pool.clone())),
            tokens,
            session_config,
            request_timeout,
        )
    }

    pub fn in_memory(
        store: MemoryStore,
        tokens: Arc<dyn TokenMaker>,
        session_config: SessionConfig,
        request_timeout: Duration,
    ) -> Self {
        let store = Arc::new(store);
        Self::assemble(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            tokens,
            session_config,
            request_timeout,
        )
    }
}
