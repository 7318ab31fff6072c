//! Shared type definitions for Supmap navigation.
//!
//! This crate is the single source of truth for the data exchanged between
//! the navigation gateway, the session store, the routing service and the
//! incident feed.
//!
//! # Modules
//!
//! - [`ids`] -- Session and connection identifiers
//! - [`session`] -- Navigation session (last position + active route)
//! - [`incident`] -- Incidents and incident feed events
//! - [`routing`] -- Routing service request/response model
//! - [`wire`] -- `WebSocket` envelopes exchanged with navigating clients

pub mod ids;
pub mod incident;
pub mod routing;
pub mod session;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use ids::{ConnectionId, SessionId};
pub use incident::{Incident, IncidentAction, IncidentEvent, IncidentType, InvalidIncident};
pub use navigation_geo::Point;
pub use routing::{
    Costing, CostingOptions, Leg, LocationRequest, LocationResponse, LocationType, Maneuver,
    Ratio, RouteRequest, RouteResponse, Summary, Trip,
};
pub use session::{Location, Position, Route, Session};
pub use wire::{
    ClientEnvelope, IncidentPayload, RECALCULATED_DUE_TO_INCIDENT, RoutePayload, ServerMessage,
};
