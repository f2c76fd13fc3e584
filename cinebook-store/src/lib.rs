pub mod app_config;
pub mod database;
pub mod booking_repo;
pub mod session_repo;
pub mod user_repo;
pub mod catalog_repo;
pub mod memory;

pub use database::DbClient;
pub use booking_repo::PgBookingStore;
pub use session_repo::PgSessionRepository;
pub use user_repo::PgUserRepository;
pub use catalog_repo::PgCatalogRepository;
pub use memory::MemoryStore;

use cinebook_core::repository::StoreError;

/// Translate a driver error into the repository error the core understands.
pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation(db_err.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}
