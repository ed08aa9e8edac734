//! Bearer token extraction
//!
//! The token is forwarded verbatim to the Urban API; nothing about its
//! contents is checked here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;

/// Opaque credential from an `Authorization: Bearer <token>` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parse an `Authorization` header value
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(value: &str) -> Result<BearerToken, ApiError> {
    let (scheme, token) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::BadRequest("Invalid authentication credentials".to_string()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Empty bearer token".to_string()));
    }

    Ok(BearerToken(token.to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let value = header
            .to_str()
            .map_err(|_| ApiError::BadRequest("Authorization header is not valid text".to_string()))?;

        parse_bearer(value)
    }
}
