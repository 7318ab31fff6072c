//! Navigation session model.
//!
//! A [`Session`] is the server-side record of one navigating client: where
//! it was last seen and which route it is following. The client pushes the
//! whole document with an `init` message, then streams `position` updates;
//! the incident multicaster rewrites the route polyline when it
//! recalculates.

use chrono::{DateTime, Utc};
use navigation_geo::Point;
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::routing::Trip;

/// Server-side record of a client's last position and active route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier; must match the connection's `session_id`.
    #[serde(rename = "session_id")]
    pub id: SessionId,
    /// Last known position reported by the client.
    pub last_position: Position,
    /// Route the client is currently following.
    pub route: Route,
    /// Last time the session was modified.
    pub updated_at: DateTime<Utc>,
}

/// A timestamped position fix reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// When the fix was taken (client clock).
    pub timestamp: DateTime<Utc>,
}

/// A route stop as originally requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

/// The route a session is following.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Ordered waypoints of the traveled path.
    pub polyline: Vec<Point>,
    /// Ordered route stops; the first entry is the origin.
    pub locations: Vec<Location>,
}

impl Session {
    /// Overwrite the last known position and bump `updated_at`.
    pub const fn apply_position(&mut self, position: Position, now: DateTime<Utc>) {
        self.last_position = position;
        self.updated_at = now;
    }

    /// Route stops for a recalculation that starts where the client is now.
    ///
    /// The first stop (the planned origin) is replaced by the last known
    /// position; the remaining stops are kept in order. A session with no
    /// stops yields only the re-anchored origin.
    pub fn reanchored_stops(&self) -> Vec<Location> {
        let origin = Location {
            lat: self.last_position.lat,
            lon: self.last_position.lon,
        };
        std::iter::once(origin)
            .chain(self.route.locations.iter().skip(1).copied())
            .collect()
    }

    /// Replace the polyline with the concatenated leg shapes of `trip`.
    pub fn apply_trip(&mut self, trip: &Trip, now: DateTime<Utc>) {
        self.route.polyline = trip.polyline();
        self.updated_at = now;
    }
}
