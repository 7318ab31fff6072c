//! Incidents and incident feed events.
//!
//! An [`Incident`] is a read-only projection of an upstream report (an
//! accident, a closed road, a police check). The upstream service
//! publishes every lifecycle change as an [`IncidentEvent`] on a pub/sub
//! channel; the action tag drives the multicast policy.

use chrono::{DateTime, Utc};
use navigation_geo::Point;
use serde::{Deserialize, Serialize};

/// An upstream-reported incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Upstream identifier.
    pub id: i64,
    /// Identity of the reporting user.
    pub user_id: i64,
    /// Incident category, when the upstream service attached one.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<IncidentType>,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Incident category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentType {
    /// Upstream category identifier, when the feed carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Short name (e.g. `"Accident"`).
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Whether a certified incident of this type forces affected clients
    /// onto a new route.
    #[serde(alias = "need_recalculation")]
    pub needs_recalculation: bool,
}

/// Why an incident event was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidIncident {
    /// The incident id is zero or negative.
    #[error("invalid incident id: {0}")]
    Id(i64),
    /// Latitude outside `[-90, 90]`.
    #[error("invalid latitude: {0}")]
    Latitude(f64),
    /// Longitude outside `[-180, 180]`.
    #[error("invalid longitude: {0}")]
    Longitude(f64),
}

impl Incident {
    /// The incident's location.
    pub const fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }

    /// Whether this incident's category asks for route recalculation.
    pub fn needs_recalculation(&self) -> bool {
        self.kind.as_ref().is_some_and(|kind| kind.needs_recalculation)
    }

    /// Check identifier and coordinate ranges.
    pub fn validate(&self) -> Result<(), InvalidIncident> {
        if self.id <= 0 {
            return Err(InvalidIncident::Id(self.id));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(InvalidIncident::Latitude(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(InvalidIncident::Longitude(self.lon));
        }
        Ok(())
    }
}

/// Lifecycle tag of an incident event.
///
/// Any other value fails to decode, which the subscriber treats as a
/// validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentAction {
    /// A new incident was reported.
    Create,
    /// The incident was confirmed by other users.
    Certified,
    /// The incident was removed.
    Deleted,
}

impl IncidentAction {
    /// Wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Certified => "certified",
            Self::Deleted => "deleted",
        }
    }
}

impl core::fmt::Display for IncidentAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the incident feed: `{"data": <Incident>, "action": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// The incident as of this event.
    #[serde(rename = "data")]
    pub incident: Incident,
    /// What happened to it.
    pub action: IncidentAction,
}

impl IncidentEvent {
    /// Whether this event should trigger a route recalculation for the
    /// clients it is relevant to.
    pub fn requires_recalculation(&self) -> bool {
        self.action == IncidentAction::Certified && self.incident.needs_recalculation()
    }
}
