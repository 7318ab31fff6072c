//! Routing service request/response model.
//!
//! The routing service takes an ordered list of stops and a costing
//! profile and answers with one or more candidate trips. Each trip is made
//! of legs (one per pair of consecutive stops) carrying a shape, turn by
//! turn maneuvers and time/length summaries.

use navigation_geo::Point;
use serde::{Deserialize, Serialize};

use crate::session::Location;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A route calculation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Ordered stops; at least two are required.
    pub locations: Vec<LocationRequest>,
    /// Routing profile.
    pub costing: Costing,
    /// Optional profile tuning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costing_options: Option<CostingOptions>,
    /// Language of maneuver instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Number of alternate routes to compute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternates: Option<u32>,
}

impl RouteRequest {
    /// Build an `auto` request with no alternates from session stops.
    pub fn without_alternates(stops: &[Location]) -> Self {
        Self {
            locations: stops.iter().map(LocationRequest::from).collect(),
            costing: Costing::Auto,
            costing_options: None,
            language: None,
            alternates: Some(0),
        }
    }

    /// Check the request before sending it.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.locations.len() < 2 {
            return Err(String::from("at least 2 locations must be provided"));
        }
        if let Some(options) = &self.costing_options {
            for (name, ratio) in [
                ("use_highways", options.use_highways),
                ("use_tolls", options.use_tolls),
                ("use_tracks", options.use_tracks),
            ] {
                if let Some(r) = ratio
                    && !r.is_valid()
                {
                    return Err(format!("{name} must be between 0 and 1"));
                }
            }
        }
        Ok(())
    }
}

/// One stop of a route request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// How the route may pass through this stop.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LocationType>,
    /// Display name of the stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Location> for LocationRequest {
    fn from(location: &Location) -> Self {
        Self {
            lat: location.lat,
            lon: location.lon,
            kind: None,
            name: None,
        }
    }
}

/// How a route passes through a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    /// Stop; allows U-turns.
    Break,
    /// Pass through without stopping.
    Through,
    /// Pass through, U-turns allowed.
    Via,
    /// Stop without U-turns.
    BreakThrough,
}

/// Routing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Costing {
    /// Car.
    Auto,
    /// Bicycle.
    Bicycle,
    /// Truck.
    Truck,
    /// Motor scooter.
    MotorScooter,
    /// Walking.
    Pedestrian,
}

/// A preference weight in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ratio(pub f64);

impl Ratio {
    /// Whether the ratio lies in `[0, 1]`.
    pub fn is_valid(self) -> bool {
        (0.0..=1.0).contains(&self.0)
    }
}

/// Profile tuning knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostingOptions {
    /// Preference for highways.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_highways: Option<Ratio>,
    /// Preference for toll roads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_tolls: Option<Ratio>,
    /// Preference for unpaved tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_tracks: Option<Ratio>,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Envelope returned by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Candidate trips, best first.
    #[serde(default)]
    pub data: Vec<Trip>,
    /// Informational message.
    #[serde(default)]
    pub message: String,
}

/// A computed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Stops as matched on the road network.
    #[serde(default)]
    pub locations: Vec<LocationResponse>,
    /// Legs between consecutive stops.
    pub legs: Vec<Leg>,
    /// Totals for the whole trip.
    #[serde(default)]
    pub summary: Summary,
}

impl Trip {
    /// The trip's full shape: every leg's shape concatenated in leg order.
    pub fn polyline(&self) -> Vec<Point> {
        self.legs
            .iter()
            .flat_map(|leg| leg.shape.iter().copied())
            .collect()
    }
}

/// Part of a trip between two consecutive stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    /// Turn by turn instructions.
    #[serde(default)]
    pub maneuvers: Vec<Maneuver>,
    /// Totals for this leg.
    #[serde(default)]
    pub summary: Summary,
    /// Decoded leg geometry.
    pub shape: Vec<Point>,
}

/// A single turn by turn instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    /// Maneuver type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Human readable instruction.
    pub instruction: String,
    /// Streets involved.
    #[serde(default)]
    pub street_names: Vec<String>,
    /// Duration in seconds.
    pub time: f64,
    /// Length in kilometers.
    pub length: f64,
    /// Index of the first shape point of this maneuver.
    pub begin_shape_index: u32,
    /// Index of the last shape point of this maneuver.
    pub end_shape_index: u32,
    /// Exit to take in a roundabout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roundabout_exit_count: Option<u8>,
}

/// Time and length totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Duration in seconds.
    pub time: f64,
    /// Length in kilometers.
    pub length: f64,
}

/// A stop as matched by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// How the route passes through this stop.
    #[serde(rename = "type")]
    pub kind: LocationType,
    /// Position of this stop in the request.
    pub original_index: u32,
    /// Display name of the stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn request_without_alternates_serializes_minimal_fields() {
        let stops = [
            Location { lat: 1.0, lon: 2.0 },
            Location { lat: 3.0, lon: 4.0 },
        ];
        let json = serde_json::to_value(RouteRequest::without_alternates(&stops)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "locations": [{"lat": 1.0, "lon": 2.0}, {"lat": 3.0, "lon": 4.0}],
                "costing": "auto",
                "alternates": 0
            })
        );
    }

    #[test]
    fn single_stop_request_is_invalid() {
        let request = RouteRequest::without_alternates(&[Location { lat: 1.0, lon: 2.0 }]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn out_of_range_ratio_is_invalid() {
        let stops = [
            Location { lat: 1.0, lon: 2.0 },
            Location { lat: 3.0, lon: 4.0 },
        ];
        let mut request = RouteRequest::without_alternates(&stops);
        request.costing_options = Some(CostingOptions {
            use_tolls: Some(Ratio(1.5)),
            ..CostingOptions::default()
        });
        assert!(request.validate().is_err());

        request.costing_options = Some(CostingOptions {
            use_tolls: Some(Ratio(0.5)),
            ..CostingOptions::default()
        });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn unknown_costing_fails_to_decode() {
        let json = r#"{"locations": [], "costing": "hovercraft"}"#;
        assert!(serde_json::from_str::<RouteRequest>(json).is_err());
    }

    #[test]
    fn response_decodes_routing_service_payload() {
        let json = serde_json::json!({
            "data": [{
                "locations": [
                    {"lat": 0.0, "lon": 0.0, "type": "break", "original_index": 0},
                    {"lat": 0.0, "lon": 1.0, "type": "break", "original_index": 1}
                ],
                "legs": [{
                    "maneuvers": [{
                        "type": 1,
                        "instruction": "Drive east.",
                        "street_names": ["Main Street"],
                        "time": 12.5,
                        "length": 0.2,
                        "begin_shape_index": 0,
                        "end_shape_index": 1
                    }],
                    "summary": {"time": 12.5, "length": 0.2},
                    "shape": [
                        {"latitude": 0.0, "longitude": 0.2},
                        {"latitude": 0.0, "longitude": 0.8}
                    ]
                }],
                "summary": {"time": 12.5, "length": 0.2}
            }],
            "message": "ok"
        });
        let response: RouteResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.data.len(), 1);
        let trip = &response.data[0];
        assert_eq!(trip.locations[1].kind, LocationType::Break);
        assert_eq!(
            trip.polyline(),
            vec![Point::new(0.0, 0.2), Point::new(0.0, 0.8)]
        );
    }
}
