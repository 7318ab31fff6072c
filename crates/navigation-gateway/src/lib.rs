//! `WebSocket` gateway for Supmap navigation clients.
//!
//! - **Connection hub** ([`Hub`]): the set of live clients, keyed by
//!   session id, with broadcast and a read view for multicasting
//! - **Client actor** ([`actor`]): per-connection inbound/outbound loops
//!   with bounded mailboxes and liveness pings
//! - **HTTP surface**: `GET /health` and `GET /ws?session_id=<id>`
//!
//! A slow client is never waited on: a full mailbox disconnects it.

pub mod actor;
pub mod client;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use client::{Client, MAILBOX_CAPACITY, SendOutcome};
pub use error::GatewayError;
pub use hub::{ClientsView, Hub, HubState};
pub use router::build_router;
pub use server::{Gateway, ServerConfig, ServerError, start_server};
pub use state::AppState;
