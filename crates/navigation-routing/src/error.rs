//! Error types for route calculation.

/// Errors that can occur while calculating a route.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The request was rejected before being sent.
    #[error("invalid route request: {0}")]
    InvalidRequest(String),

    /// The HTTP call failed (connection, timeout, body read).
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The routing service answered with a non-200 status.
    #[error("routing service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("routing response parse failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service found no route between the stops.
    #[error("no route found")]
    NoRoute,
}
