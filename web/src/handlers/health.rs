//! Health check endpoint.
//!
//! Used by load balancers to verify the process is up.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` when the handler runs
    pub status: &'static str,
    /// Crate version of the running binary
    pub version: &'static str,
}

/// Simple liveness check.
///
/// Does NOT check dependencies (database, payment provider).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<Health>) {
    (
        StatusCode::OK,
        Json(Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }
}
