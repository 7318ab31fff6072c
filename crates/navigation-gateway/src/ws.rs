//! `WebSocket` entry point.
//!
//! Clients connect to `GET /ws?session_id=<id>`. The id is checked before
//! the upgrade; once upgraded the connection is registered with the
//! [`Hub`](crate::hub::Hub) and handed to [`run_client`].

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use navigation_types::SessionId;
use serde::Deserialize;
use tracing::warn;

use crate::actor::run_client;
use crate::error::GatewayError;
use crate::hub::HubState;
use crate::state::AppState;

/// Query parameters of the `/ws` route.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Identity of the navigating client.
    pub session_id: Option<String>,
}

/// Upgrade to a `WebSocket` and start the client's actor.
///
/// # Route
///
/// `GET /ws?session_id=<id>`
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    let session_id = params
        .session_id
        .filter(|id| !id.is_empty())
        .map(SessionId::new)
        .ok_or_else(|| GatewayError::InvalidQuery(String::from("missing session_id")))?;
    let ws = ws?;

    if state.hub.state().await != HubState::Running {
        return Err(GatewayError::HubClosed);
    }

    let hub = Arc::clone(&state.hub);
    let store = state.store.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let (client, mailbox) = hub.new_client(session_id);
        if let Err(e) = hub.register(Arc::clone(&client)).await {
            warn!(session_id = %client.session_id(), "connection refused: {e}");
            return;
        }
        run_client(socket, client, mailbox, hub, store).await;
    }))
}
