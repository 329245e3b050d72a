//! HTTP API.
//!
//! Routes:
//! - `GET /` service description
//! - `POST /upload` multipart upload (`files` parts plus a `directoryStructure` JSON part)
//! - `GET /retrieve/:identifier` file download or directory zip
//! - `DELETE /delete/:identifier` node removal
//! - `GET /directory` the acting user's tree
//! - `GET /health` liveness probe

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
