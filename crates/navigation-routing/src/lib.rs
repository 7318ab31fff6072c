//! Route calculation for Supmap navigation.
//!
//! The [`RouteCalculator`] trait abstracts the routing service: given
//! ordered stops and a costing profile it returns one [`Trip`]. The
//! production implementation is [`GisRoutingClient`], an HTTP client for
//! the GIS routing service.

pub mod client;
pub mod error;

use std::future::Future;

use navigation_types::{RouteRequest, Trip};

pub use client::{DEFAULT_TIMEOUT, GisRoutingClient};
pub use error::RoutingError;

/// A source of route calculations.
///
/// Implementations must fail when fewer than two stops are supplied, when
/// the upstream service errors, or when it returns no candidate route.
pub trait RouteCalculator: Send + Sync {
    /// Calculate the best route for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the request is invalid, the service is
    /// unreachable or answers with an error, or no route was found.
    fn calculate_route(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Trip, RoutingError>> + Send;
}
