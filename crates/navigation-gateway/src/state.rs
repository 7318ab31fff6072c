//! Shared application state for the gateway's HTTP handlers.

use std::sync::Arc;

use navigation_db::SessionStore;

use crate::hub::Hub;

/// State injected into every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Live client connections.
    pub hub: Arc<Hub>,
    /// Where client sessions are persisted.
    pub store: SessionStore,
}

impl AppState {
    /// Bundle the hub and the session store.
    pub const fn new(hub: Arc<Hub>, store: SessionStore) -> Self {
        Self { hub, store }
    }
}
