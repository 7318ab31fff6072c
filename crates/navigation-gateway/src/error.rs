//! Error types for the navigation gateway.
//!
//! [`GatewayError`] unifies the HTTP-facing failure modes into a single
//! enum that can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the gateway's HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// An invalid or missing query parameter.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request could not be upgraded to a `WebSocket`.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(#[from] WebSocketUpgradeRejection),

    /// The hub is shutting down and no longer accepts connections.
    #[error("hub is shutting down")]
    HubClosed,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Upgrade(rejection) => (rejection.status(), rejection.body_text()),
            Self::HubClosed => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
