//! Event subscriber: bounded concurrent ingestion of the incident feed.
//!
//! [`Subscriber::run`] pulls raw payloads from a feed stream and hands
//! each one to a spawned task that decodes, validates and forwards it to
//! an [`IncidentHandler`]. At most `max_concurrent` tasks run at once;
//! when the gate is full the subscriber stops pulling from the feed until
//! a slot frees, so events are delayed rather than dropped.

use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use navigation_types::IncidentEvent;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::IncidentError;

/// Default size of the admission gate.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Something that reacts to validated incident events.
pub trait IncidentHandler: Send + Sync + 'static {
    /// Process one event. Failures are handled (logged) internally.
    fn handle(&self, event: IncidentEvent) -> impl Future<Output = ()> + Send;
}

/// Decode and validate one raw feed payload.
///
/// # Errors
///
/// Returns [`IncidentError::Decode`] for malformed JSON or an unknown
/// action tag, and [`IncidentError::Invalid`] for out-of-range fields.
pub fn decode_event(payload: &[u8]) -> Result<IncidentEvent, IncidentError> {
    let event: IncidentEvent = serde_json::from_slice(payload)?;
    event.incident.validate()?;
    Ok(event)
}

/// Feeds incident events to a handler with bounded concurrency.
pub struct Subscriber<H> {
    handler: Arc<H>,
    gate: Arc<Semaphore>,
    max_concurrent: usize,
}

impl<H: IncidentHandler> Subscriber<H> {
    /// Create a subscriber running at most `max_concurrent` handlers.
    pub fn new(handler: Arc<H>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            handler,
            gate: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Consume `events` until the feed closes or `cancel` fires.
    ///
    /// Returns after every handler it started has finished.
    pub async fn run<S>(&self, mut events: S, cancel: CancellationToken)
    where
        S: Stream<Item = Vec<u8>> + Unpin,
    {
        info!(max_concurrent = self.max_concurrent, "incident subscriber is running");
        let mut in_flight = JoinSet::new();

        loop {
            let payload = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("shutting down incident subscriber");
                    break;
                }
                next = events.next() => match next {
                    Some(payload) => payload,
                    None => {
                        warn!("incident feed closed by the broker");
                        break;
                    }
                },
            };

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("shutting down incident subscriber");
                    break;
                }
                permit = Arc::clone(&self.gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!("admission gate closed: {e}");
                        break;
                    }
                },
            };

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    warn!("incident handler task failed: {e}");
                }
            }

            let handler = Arc::clone(&self.handler);
            in_flight.spawn(async move {
                let _permit = permit;
                match decode_event(&payload) {
                    Ok(event) => handler.handle(event).await,
                    Err(e) => warn!("incident event discarded: {e}"),
                }
            });
        }

        if !in_flight.is_empty() {
            debug!(in_flight = in_flight.len(), "waiting for incident handlers");
        }
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                warn!("incident handler task failed: {e}");
            }
        }
        info!("incident subscriber stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(id: i64, action: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "data": {
                "id": id,
                "user_id": 7,
                "lat": 48.85,
                "lon": 2.35,
                "created_at": "2025-01-01T08:00:00Z",
                "updated_at": "2025-01-01T08:00:00Z"
            },
            "action": action
        }))
        .unwrap()
    }

    #[test]
    fn valid_event_decodes() {
        let event = decode_event(&payload(1, "certified")).unwrap();
        assert_eq!(event.incident.id, 1);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(matches!(
            decode_event(&payload(1, "teleported")),
            Err(IncidentError::Decode(_))
        ));
    }

    #[test]
    fn invalid_incident_is_rejected() {
        assert!(matches!(
            decode_event(&payload(0, "create")),
            Err(IncidentError::Invalid(_))
        ));
    }

    #[test]
    fn type_without_id_decodes() {
        let raw = serde_json::json!({
            "data": {
                "id": 5,
                "user_id": 7,
                "type": {
                    "name": "Closure",
                    "description": "road closed",
                    "needs_recalculation": true
                },
                "lat": 48.85,
                "lon": 2.35,
                "created_at": "2025-01-01T08:00:00Z",
                "updated_at": "2025-01-01T08:00:00Z"
            },
            "action": "certified"
        });
        let event = decode_event(&serde_json::to_vec(&raw).unwrap()).unwrap();
        assert_eq!(event.incident.kind.as_ref().and_then(|kind| kind.id), None);
        assert!(event.requires_recalculation());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_event(b"{oops"), Err(IncidentError::Decode(_))));
    }
}
