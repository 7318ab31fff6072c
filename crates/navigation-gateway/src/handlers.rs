//! Plain HTTP handlers.

use axum::http::header;
use axum::response::IntoResponse;

/// Liveness probe.
///
/// # Route
///
/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        "API server is started.",
    )
}
