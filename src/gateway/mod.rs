//! Registration gateway — the secret-gated boundary in front of the store.

pub mod routes;
pub mod service;

pub use routes::{BOT_SECRET_HEADER, REGISTRATION_PATH, gateway_routes};
pub use service::{RegisterRequest, RegistrationService};
