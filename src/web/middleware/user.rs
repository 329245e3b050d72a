//! Acting-user extraction.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Header naming the user a request acts for.
pub const USER_HEADER: &str = "x-dspace-user";

/// The user whose tree a request reads or changes.
///
/// Taken from the `X-Dspace-User` header; requests without it act for the
/// configured default user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentifier(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for UserIdentifier {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(Self(state.default_user.clone()));
        };

        let user = value
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid user header"))?
            .trim();

        if user.is_empty() {
            Ok(Self(state.default_user.clone()))
        } else {
            Ok(Self(user.to_string()))
        }
    }
}
