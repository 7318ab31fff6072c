//! Error types for incident ingestion.

use navigation_types::InvalidIncident;

/// Errors raised while connecting to a feed or decoding its events.
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// The Redis feed client failed.
    #[error("redis feed error: {0}")]
    Redis(#[from] fred::error::Error),

    /// The NATS feed client failed.
    #[error("nats feed error: {0}")]
    Nats(String),

    /// A feed URL could not be parsed.
    #[error("feed configuration error: {0}")]
    Config(String),

    /// An event payload is not a valid incident event JSON document.
    #[error("undecodable incident event: {0}")]
    Decode(#[from] serde_json::Error),

    /// An event decoded but carries an invalid incident.
    #[error("invalid incident: {0}")]
    Invalid(#[from] InvalidIncident),
}
