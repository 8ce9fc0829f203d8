//! Custom Axum extractors.
//!
//! - `CorrelationId`: extract or generate request correlation IDs
//! - `AccountHeader`: the calling account, from `X-Account-Id`
//! - `MaybeAccount`: same, but optional
//!
//! Session handling is outside this crate; an upstream gateway is expected to
//! authenticate the caller and forward the account id.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

/// Header carrying the caller's account id.
pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// Header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Correlation ID for request tracing.
///
/// Taken from `X-Correlation-ID`, or a fresh UUID v4 when absent.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The authenticated account making the request.
///
/// Rejects with 401 when the header is missing or not a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountHeader(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AccountHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        account_from_headers(&parts.headers)
            .map(Self)
            .ok_or_else(|| AppError::unauthorized(format!("Missing or invalid {ACCOUNT_HEADER}")))
    }
}

/// The calling account, if the request carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeAccount(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAccount
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(account_from_headers(&parts.headers)))
    }
}

fn account_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}
