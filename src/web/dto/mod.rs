//! Data Transfer Objects for the HTTP API.

mod response;

pub use response::*;
