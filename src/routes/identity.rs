use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the caller's opaque user id.
pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller, read from the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CurrentUser(value.to_string()))
            .ok_or_else(|| AppError::Unauthorized("Sign in to continue".into()))
    }
}
