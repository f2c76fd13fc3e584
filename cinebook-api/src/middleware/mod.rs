pub mod auth;
pub mod client;

pub use auth::{admin_auth_middleware, customer_auth_middleware};
pub use client::ClientMeta;
