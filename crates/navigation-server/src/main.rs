//! Supmap navigation service.
//!
//! Wires the subsystems together and runs until `SIGINT`/`SIGTERM`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize structured logging (tracing)
//! 3. Connect the session store
//! 4. Start the connection hub
//! 5. Build the routing client and the incident multicaster
//! 6. Subscribe to the incident feed and start the subscriber
//! 7. Serve HTTP until shutdown, then stop the hub and the subscriber

mod config;
mod error;

use std::sync::Arc;

use navigation_db::{DragonflyPool, DragonflySessionStore, MemorySessionStore, SessionStore};
use navigation_gateway::{AppState, Hub, start_server};
use navigation_incidents::{Multicaster, Subscriber};
use navigation_routing::GisRoutingClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Environment, ServerConfig, StoreKind};
use crate::error::ServerError;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Configuration.
    let config = ServerConfig::from_env()?;

    // 2. Logging.
    init_tracing(config.environment);
    info!(
        host = config.http.host,
        port = config.http.port,
        feed = config.incident_feed().name(),
        channel = config.incidents_channel,
        max_concurrent_handlers = config.max_concurrent_handlers,
        "navigation-server starting"
    );

    // 3. Session store.
    let store = connect_store(&config).await?;
    info!(store = store.name(), ttl_secs = config.session_ttl.as_secs(), "Session store ready");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    // 4. Connection hub.
    let hub = Arc::new(Hub::new(shutdown.child_token()));
    let hub_task = hub.start();

    // 5. Routing and multicast.
    let routing = GisRoutingClient::new(config.gis_base_url.as_str(), config.routing_timeout)?;
    info!(base_url = routing.base_url(), "Routing client ready");
    let multicaster = Arc::new(Multicaster::new(Arc::clone(&hub), store.clone(), routing));

    // 6. Incident feed.
    let events = config.incident_feed().subscribe().await?;
    let subscriber = Subscriber::new(multicaster, config.max_concurrent_handlers);
    let subscriber_task = {
        let cancel = shutdown.child_token();
        tokio::spawn(async move { subscriber.run(events, cancel).await })
    };

    // 7. HTTP server.
    let state = Arc::new(AppState::new(Arc::clone(&hub), store));
    let served = start_server(&config.http, state, shutdown.clone()).await;

    // A server failure stops the rest as well.
    shutdown.cancel();
    if let Err(e) = hub_task.await {
        warn!("hub task failed: {e}");
    }
    if let Err(e) = subscriber_task.await {
        warn!("subscriber task failed: {e}");
    }

    served?;
    info!("navigation-server stopped");
    Ok(())
}

/// JSON logs in production, human readable debug logs in development.
/// `RUST_LOG` overrides the level in both.
fn init_tracing(environment: Environment) {
    let default_level = match environment {
        Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match environment {
        Environment::Dev => builder.init(),
        Environment::Prod => builder.json().init(),
    }
}

async fn connect_store(config: &ServerConfig) -> Result<SessionStore, ServerError> {
    match config.session_store {
        StoreKind::Dragonfly => {
            let pool = DragonflyPool::connect(&config.redis_url).await?;
            Ok(DragonflySessionStore::new(pool, config.session_ttl).into())
        }
        StoreKind::Memory => {
            warn!("Using the in-memory session store; sessions are local to this process");
            Ok(MemorySessionStore::new(config.session_ttl).into())
        }
    }
}

/// Cancel `token` on `Ctrl-C` or `SIGTERM`.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
    token.cancel();
}
