//! `WebSocket` envelopes exchanged with navigating clients.
//!
//! Both directions use the same JSON shape, `{"type": .., "data": ..}`.
//! Inbound messages are decoded in two steps: first the envelope, then the
//! payload for the given type, so that an unknown type or a bad payload
//! does not cost the client its connection. Outbound messages are typed.

use serde::{Deserialize, Serialize};

use crate::incident::{Incident, IncidentAction};
use crate::routing::Trip;

/// Informational tag attached to routes pushed after an incident.
pub const RECALCULATED_DUE_TO_INCIDENT: &str = "recalculated_due_to_incident";

/// Inbound message envelope with an undecoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Message type (`init`, `position`, `route`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Message pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// An incident relevant to the client's route.
    Incident(IncidentPayload),
    /// A route recalculated on the client's behalf.
    Route(RoutePayload),
}

/// Payload of an `incident` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentPayload {
    /// The incident.
    pub incident: Incident,
    /// The lifecycle change that triggered the notification.
    pub action: IncidentAction,
}

/// Payload of a `route` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePayload {
    /// The recalculated trip.
    pub route: Trip,
    /// Why the route was pushed.
    pub info: String,
}

impl RoutePayload {
    /// Payload for a route recalculated because of an incident.
    pub fn recalculated(route: Trip) -> Self {
        Self {
            route,
            info: RECALCULATED_DUE_TO_INCIDENT.to_owned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routing::Summary;

    #[test]
    fn envelope_without_data_decodes() {
        let envelope: ClientEnvelope = serde_json::from_str(r#"{"type": "route"}"#).unwrap();
        assert_eq!(envelope.kind, "route");
        assert!(envelope.data.is_null());
    }

    #[test]
    fn envelope_without_type_fails() {
        assert!(serde_json::from_str::<ClientEnvelope>(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn route_message_uses_type_and_data() {
        let trip = Trip {
            locations: Vec::new(),
            legs: Vec::new(),
            summary: Summary::default(),
        };
        let json = serde_json::to_value(ServerMessage::Route(RoutePayload::recalculated(trip)))
            .unwrap();
        assert_eq!(json["type"], "route");
        assert_eq!(json["data"]["info"], RECALCULATED_DUE_TO_INCIDENT);
        assert!(json["data"]["route"]["legs"].is_array());
    }
}
