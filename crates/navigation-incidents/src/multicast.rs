//! Route-aware incident multicast.
//!
//! For every connected client whose stored route passes within
//! [`RELEVANCE_TOLERANCE_M`] of an incident, the [`Multicaster`] sends an
//! `incident` message. When the event is a certified incident whose type
//! requires it, the client's route is first recalculated from its last
//! known position, persisted, and pushed as a `route` message.
//!
//! The hub's read view is held for the whole traversal, routing calls
//! included, so membership changes wait until the event is processed.

use std::sync::Arc;

use chrono::Utc;
use navigation_db::SessionStore;
use navigation_gateway::{Client, Hub};
use navigation_geo::is_point_near_polyline;
use navigation_routing::RouteCalculator;
use navigation_types::{IncidentEvent, IncidentPayload, RoutePayload, RouteRequest, ServerMessage};
use tracing::{debug, info, warn};

use crate::subscriber::IncidentHandler;

/// Maximum distance in meters between an incident and a route for the
/// incident to concern that route.
pub const RELEVANCE_TOLERANCE_M: f64 = 30.0;

/// Dispatches incident events to the clients whose route they affect.
pub struct Multicaster<R> {
    hub: Arc<Hub>,
    store: SessionStore,
    routing: R,
}

impl<R: RouteCalculator> Multicaster<R> {
    /// Create a multicaster over the given hub, store and router.
    pub const fn new(hub: Arc<Hub>, store: SessionStore, routing: R) -> Self {
        Self { hub, store, routing }
    }

    /// Notify every affected client. Returns how many were notified.
    pub async fn multicast(&self, event: &IncidentEvent) -> usize {
        let clients = self.hub.clients().await;
        let point = event.incident.point();
        let recalculate = event.requires_recalculation();
        let mut notified: usize = 0;

        for (session_id, client) in clients.iter() {
            let session = match self.store.get(session_id).await {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(e) => {
                    debug!(session_id = %session_id, "session lookup failed: {e}");
                    continue;
                }
            };
            if !is_point_near_polyline(point, &session.route.polyline, RELEVANCE_TOLERANCE_M) {
                continue;
            }

            if recalculate {
                self.reroute(client).await;
            }
            client.send(ServerMessage::Incident(IncidentPayload {
                incident: event.incident.clone(),
                action: event.action,
            }));
            notified = notified.saturating_add(1);
        }

        info!(
            incident_id = event.incident.id,
            action = %event.action,
            clients = clients.len(),
            notified,
            "incident multicast"
        );
        notified
    }

    /// Recalculate `client`'s route from its last known position.
    ///
    /// Errors are logged; the caller still sends the incident.
    async fn reroute(&self, client: &Client) {
        let session_id = client.session_id();
        let _guard = client.lock_session().await;

        // Re-read under the lock so a concurrent position update is kept.
        let mut session = match self.store.get(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                warn!(session_id = %session_id, "session reload failed: {e}");
                return;
            }
        };

        let request = RouteRequest::without_alternates(&session.reanchored_stops());
        let trip = match self.routing.calculate_route(&request).await {
            Ok(trip) => trip,
            Err(e) => {
                warn!(session_id = %session_id, "route recalculation failed: {e}");
                return;
            }
        };

        session.apply_trip(&trip, Utc::now());
        if let Err(e) = self.store.set(&session).await {
            warn!(session_id = %session_id, "failed to store recalculated route: {e}");
        }
        client.send(ServerMessage::Route(RoutePayload::recalculated(trip)));
        debug!(session_id = %session_id, "route recalculated");
    }
}

impl<R: RouteCalculator + 'static> IncidentHandler for Multicaster<R> {
    async fn handle(&self, event: IncidentEvent) {
        self.multicast(&event).await;
    }
}
