//! The connection hub: the live set of connected clients.
//!
//! Membership is a map from session id to [`Client`] guarded by a single
//! readers/exclusive-writer lock. `register` and `unregister` take the
//! write side; [`Hub::clients`] hands out the read side to callers that
//! walk every client (the incident multicaster), which keeps the map from
//! changing under them for as long as they hold the view.
//!
//! # Lifecycle
//!
//! ```text
//! Running --shutdown()--> ShuttingDown --> Stopped
//! ```
//!
//! Once the hub leaves `Running`, registrations are rejected while
//! unregistrations are still honored. [`Hub::start`] ties the lifecycle to
//! the process cancellation token.
//!
//! # Duplicate session ids
//!
//! The last connection wins: registering a client whose session id is
//! already present closes the previous connection before installing the
//! new one. The evicted connection's own unregistration is then a no-op,
//! because clients are compared by connection identity, not session id.

use std::collections::HashMap;
use std::sync::Arc;

use navigation_types::{ServerMessage, SessionId};
use tokio::sync::{RwLock, RwLockReadGuard, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{Client, MAILBOX_CAPACITY, SendOutcome};
use crate::error::GatewayError;

/// Lifecycle state of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// Accepting registrations.
    Running,
    /// Closing clients; registrations are rejected.
    ShuttingDown,
    /// All clients closed.
    Stopped,
}

#[derive(Debug)]
struct Members {
    clients: HashMap<SessionId, Arc<Client>>,
    state: HubState,
}

/// The set of live client connections.
#[derive(Debug)]
pub struct Hub {
    members: RwLock<Members>,
    cancel: CancellationToken,
    mailbox_capacity: usize,
}

/// A read-locked view of the connected clients.
///
/// Registrations and unregistrations wait until the view is dropped.
pub struct ClientsView<'a> {
    guard: RwLockReadGuard<'a, Members>,
}

impl ClientsView<'_> {
    /// Iterate over `(session id, client)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &Arc<Client>)> {
        self.guard.clients.iter()
    }

    /// Look up a connected client.
    pub fn get(&self, session_id: &SessionId) -> Option<&Arc<Client>> {
        self.guard.clients.get(session_id)
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.guard.clients.len()
    }

    /// Whether no client is connected.
    pub fn is_empty(&self) -> bool {
        self.guard.clients.is_empty()
    }
}

impl Hub {
    /// Create a running hub whose clients get `MAILBOX_CAPACITY` slots.
    ///
    /// `cancel` is the process shutdown signal.
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_mailbox_capacity(cancel, MAILBOX_CAPACITY)
    }

    /// Create a running hub with a custom per-client mailbox size.
    pub fn with_mailbox_capacity(cancel: CancellationToken, mailbox_capacity: usize) -> Self {
        Self {
            members: RwLock::new(Members {
                clients: HashMap::new(),
                state: HubState::Running,
            }),
            cancel,
            mailbox_capacity,
        }
    }

    /// Shut the hub down when the process cancellation token fires.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        info!("Connection hub is running");
        tokio::spawn(async move {
            hub.cancel.cancelled().await;
            hub.shutdown().await;
        })
    }

    /// Create a client handle for a new connection.
    ///
    /// The client's signal is a child of the hub's, so process shutdown
    /// closes it. The client is not registered yet.
    pub fn new_client(&self, session_id: SessionId) -> (Arc<Client>, mpsc::Receiver<ServerMessage>) {
        let (client, mailbox) =
            Client::new(session_id, self.mailbox_capacity, self.cancel.child_token());
        (Arc::new(client), mailbox)
    }

    /// Add a client under its session id.
    ///
    /// A previous connection with the same session id is closed and
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::HubClosed`] once the hub is shutting down.
    pub async fn register(&self, client: Arc<Client>) -> Result<(), GatewayError> {
        let mut members = self.members.write().await;
        if members.state != HubState::Running {
            return Err(GatewayError::HubClosed);
        }

        let session_id = client.session_id().clone();
        let connection_id = client.connection_id();
        if let Some(previous) = members.clients.insert(session_id.clone(), client)
            && previous.connection_id() != connection_id
        {
            previous.close_mailbox();
            previous.close();
            info!(
                session_id = %session_id,
                evicted = %previous.connection_id(),
                connection_id = %connection_id,
                "session reconnected, previous connection evicted"
            );
        }
        debug!(session_id = %session_id, connection_id = %connection_id, clients = members.clients.len(), "client connected");
        Ok(())
    }

    /// Remove a client and close its mailbox.
    ///
    /// Only removes the entry if it is this very connection. Returns
    /// whether anything was removed; a second call is a no-op.
    pub async fn unregister(&self, client: &Client) -> bool {
        let mut members = self.members.write().await;
        let is_current = members
            .clients
            .get(client.session_id())
            .is_some_and(|current| current.connection_id() == client.connection_id());
        if !is_current {
            return false;
        }

        members.clients.remove(client.session_id());
        client.close_mailbox();
        debug!(
            session_id = %client.session_id(),
            connection_id = %client.connection_id(),
            clients = members.clients.len(),
            "client disconnected"
        );
        true
    }

    /// Queue `message` for every connected client.
    ///
    /// A client whose mailbox is full is disconnected; the others still
    /// receive the message. Returns how many clients it was queued for.
    pub async fn broadcast(&self, message: &ServerMessage) -> usize {
        let view = self.clients().await;
        let mut queued: usize = 0;
        for (_, client) in view.iter() {
            if client.send(message.clone()) == SendOutcome::Queued {
                queued = queued.saturating_add(1);
            }
        }
        queued
    }

    /// Read-locked view of the connected clients.
    ///
    /// Hold it for the whole traversal; membership changes wait for it.
    pub async fn clients(&self) -> ClientsView<'_> {
        ClientsView {
            guard: self.members.read().await,
        }
    }

    /// Number of connected clients.
    pub async fn len(&self) -> usize {
        self.members.read().await.clients.len()
    }

    /// Whether no client is connected.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.clients.is_empty()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> HubState {
        self.members.read().await.state
    }

    /// Stop accepting clients and close every connected one. Idempotent.
    pub async fn shutdown(&self) {
        let mut members = self.members.write().await;
        if members.state == HubState::Stopped {
            return;
        }
        members.state = HubState::ShuttingDown;
        info!(clients = members.clients.len(), "shutting down connection hub");

        for (_, client) in members.clients.drain() {
            client.close_mailbox();
            client.close();
        }
        members.state = HubState::Stopped;
    }
}
