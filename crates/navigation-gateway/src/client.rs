//! The runtime handle of one connected navigation client.
//!
//! A [`Client`] pairs a session id with a bounded outbound mailbox and a
//! cancellation token shared by the connection's inbound and outbound
//! loops (see [`crate::actor`]). The [`Hub`](crate::hub::Hub) owns the
//! handles of live clients; producers (the hub's broadcast, the incident
//! multicaster) push messages with [`Client::send`].
//!
//! # Backpressure
//!
//! [`Client::send`] never waits. When the mailbox is full the client is
//! considered too slow and is disconnected, so a stalled consumer can never
//! hold up a producer or grow its queue without bound.

use std::sync::Mutex;

use navigation_types::{ConnectionId, ServerMessage, SessionId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{MutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of messages that can be queued for one client.
pub const MAILBOX_CAPACITY: usize = 16;

/// Result of a [`Client::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was queued.
    Queued,
    /// The mailbox was full; the client has been disconnected.
    Disconnected,
    /// The client is already closed; the message was dropped.
    Closed,
}

/// A connected client, as seen by the hub and the message producers.
#[derive(Debug)]
pub struct Client {
    session_id: SessionId,
    connection_id: ConnectionId,
    /// `None` once the hub has unregistered the client.
    mailbox: Mutex<Option<mpsc::Sender<ServerMessage>>>,
    cancel: CancellationToken,
    /// Serializes read-modify-write cycles on this client's stored session.
    session_lock: tokio::sync::Mutex<()>,
}

impl Client {
    /// Create a client handle and the receiving end of its mailbox.
    ///
    /// `cancel` is the connection's shutdown signal; pass a child of the
    /// process token so that process shutdown reaches every connection.
    pub fn new(
        session_id: SessionId,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            session_id,
            connection_id: ConnectionId::new(),
            mailbox: Mutex::new(Some(tx)),
            cancel,
            session_lock: tokio::sync::Mutex::new(()),
        };
        (client, rx)
    }

    /// The session this connection belongs to.
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Identity of this particular connection.
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queue `message` for delivery without waiting.
    ///
    /// A full mailbox disconnects the client.
    pub fn send(&self, message: ServerMessage) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }
        let result = {
            let Ok(guard) = self.mailbox.lock() else {
                warn!(
                    session_id = %self.session_id,
                    connection_id = %self.connection_id,
                    "client mailbox lock poisoned, dropping message"
                );
                return SendOutcome::Closed;
            };
            match guard.as_ref() {
                Some(tx) => tx.try_send(message),
                None => return SendOutcome::Closed,
            }
        };

        match result {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                warn!(
                    session_id = %self.session_id,
                    connection_id = %self.connection_id,
                    "client mailbox full, forcing disconnect"
                );
                self.close();
                SendOutcome::Disconnected
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Close the connection. Idempotent and callable from any task.
    ///
    /// Cancels the shared signal; the outbound loop answers it by sending
    /// a normal-closure frame, the inbound loop by unregistering.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(
                session_id = %self.session_id,
                connection_id = %self.connection_id,
                "closing client"
            );
        }
        self.cancel.cancel();
    }

    /// Whether [`Client::close`] was called (or the process is shutting down).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the client is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Drop the sending side of the mailbox so the outbound loop drains
    /// what is queued and then stops. Returns whether it was still open.
    pub(crate) fn close_mailbox(&self) -> bool {
        match self.mailbox.lock() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => {
                warn!(
                    session_id = %self.session_id,
                    connection_id = %self.connection_id,
                    "client mailbox lock poisoned, cannot close mailbox"
                );
                false
            }
        }
    }

    /// Take the per-session write lock.
    ///
    /// Hold it across any get-modify-set sequence on this client's stored
    /// session so concurrent writers do not lose each other's updates.
    pub async fn lock_session(&self) -> MutexGuard<'_, ()> {
        self.session_lock.lock().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use navigation_types::{Incident, IncidentAction, IncidentPayload};

    use super::*;

    fn message(id: i64) -> ServerMessage {
        ServerMessage::Incident(IncidentPayload {
            incident: Incident {
                id,
                user_id: 1,
                kind: None,
                lat: 0.0,
                lon: 0.0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted_at: None,
            },
            action: IncidentAction::Create,
        })
    }

    #[test]
    fn queued_messages_arrive_in_order() {
        let (client, mut rx) = Client::new(SessionId::new("a"), 4, CancellationToken::new());
        for id in 1..=3 {
            assert_eq!(client.send(message(id)), SendOutcome::Queued);
        }
        for id in 1..=3 {
            assert_eq!(rx.try_recv().unwrap(), message(id));
        }
    }

    #[test]
    fn full_mailbox_disconnects() {
        let (client, _rx) = Client::new(SessionId::new("a"), 2, CancellationToken::new());
        assert_eq!(client.send(message(1)), SendOutcome::Queued);
        assert_eq!(client.send(message(2)), SendOutcome::Queued);
        assert!(!client.is_closed());

        assert_eq!(client.send(message(3)), SendOutcome::Disconnected);
        assert!(client.is_closed());
        assert_eq!(client.send(message(4)), SendOutcome::Closed);
    }

    #[test]
    fn closed_mailbox_drops_messages() {
        let (client, mut rx) = Client::new(SessionId::new("a"), 2, CancellationToken::new());
        assert!(client.close_mailbox());
        assert!(!client.close_mailbox());

        assert_eq!(client.send(message(1)), SendOutcome::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    #[allow(clippy::panic)]
    fn poisoned_mailbox_reports_closed() {
        let (client, mut rx) = Client::new(SessionId::new("a"), 2, CancellationToken::new());
        std::thread::scope(|scope| {
            let holder = scope.spawn(|| {
                let _guard = client.mailbox.lock().unwrap();
                panic!("mailbox holder crashed");
            });
            assert!(holder.join().is_err());
        });
        assert!(client.mailbox.is_poisoned());

        assert_eq!(client.send(message(1)), SendOutcome::Closed);
        assert!(!client.close_mailbox());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_is_idempotent_and_leaves_parent_running() {
        let parent = CancellationToken::new();
        let (client, _rx) = Client::new(SessionId::new("a"), 2, parent.child_token());
        client.close();
        client.close();
        assert!(client.is_closed());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn parent_cancellation_closes_client() {
        let parent = CancellationToken::new();
        let (client, _rx) = Client::new(SessionId::new("a"), 2, parent.child_token());
        parent.cancel();
        assert!(client.is_closed());
    }
}
