//! Error types for the navigation server binary.

/// Top-level error for the navigation server.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// An environment variable is missing a valid value.
    #[error("config error: {0}")]
    Config(String),

    /// The session store could not be reached.
    #[error("session store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: navigation_db::DbError,
    },

    /// The routing client could not be built.
    #[error("routing error: {source}")]
    Routing {
        /// The underlying routing error.
        #[from]
        source: navigation_routing::RoutingError,
    },

    /// The incident feed could not be subscribed to.
    #[error("incident feed error: {source}")]
    Feed {
        /// The underlying feed error.
        #[from]
        source: navigation_incidents::IncidentError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("http error: {source}")]
    Http {
        /// The underlying HTTP server error.
        #[from]
        source: navigation_gateway::ServerError,
    },
}
