//! Middleware and extractors for the HTTP API.

mod cors;
mod security;
mod user;

pub use cors::create_cors_layer;
pub use security::security_headers;
pub use user::{UserIdentifier, USER_HEADER};
