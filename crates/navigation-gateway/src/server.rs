//! Gateway HTTP listener.
//!
//! [`Gateway::bind`] resolves and binds the listen address up front so a
//! caller can learn the real port (tests bind port 0). [`Gateway::serve`]
//! runs the router until the shutdown token fires, then closes the
//! connection hub so upgraded `WebSocket` connections wind down together
//! with in-flight HTTP requests.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Listen address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or address to bind to (e.g. `0.0.0.0`, `localhost`).
    pub host: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// A bound, not yet serving, gateway.
pub struct Gateway {
    listener: TcpListener,
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl Gateway {
    /// Bind the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the host does not resolve or the
    /// port is taken.
    pub async fn bind(config: &ServerConfig, state: Arc<AppState>) -> Result<Self, ServerError> {
        let bind_err = |e: io::Error| ServerError::Bind {
            host: config.host.clone(),
            port: config.port,
            source: e,
        };
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;
        Ok(Self {
            listener,
            addr,
            state,
        })
    }

    /// The address actually bound.
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] on a fatal accept-loop failure.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let Self {
            listener,
            addr,
            state,
        } = self;
        let hub = Arc::clone(&state.hub);
        info!(%addr, "gateway is listening");

        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                let clients = hub.len().await;
                let hub_state = hub.state().await;
                info!(
                    clients,
                    hub_state = ?hub_state,
                    "gateway draining connections"
                );
                hub.shutdown().await;
            })
            .await
            .map_err(ServerError::Serve)?;

        info!(%addr, "gateway stopped");
        Ok(())
    }
}

/// Bind and serve the gateway until `shutdown` is cancelled.
///
/// # Errors
///
/// See [`Gateway::bind`] and [`Gateway::serve`].
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    Gateway::bind(config, state).await?.serve(shutdown).await
}

/// Errors that can occur when starting or running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("cannot bind {host}:{port}: {source}")]
    Bind {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The accept loop failed.
    #[error("serve error: {0}")]
    Serve(#[source] io::Error),
}
