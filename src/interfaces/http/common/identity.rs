//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in `X-User-Id` and handlers trust it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id taken from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing X-User-Id header"))?;

        Ok(CurrentUser(user_id.to_string()))
    }
}
