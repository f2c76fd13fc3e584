pub mod reservation;
pub mod session;

pub use reservation::BookingEngine;
pub use session::{ClientInfo, IssuedSession, RenewedAccessToken, SessionConfig, SessionManager};
