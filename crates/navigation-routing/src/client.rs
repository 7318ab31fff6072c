//! HTTP client for the GIS routing service.
//!
//! Sends `POST {base_url}/route` with a JSON [`RouteRequest`] and expects a
//! [`RouteResponse`] envelope whose first trip is the answer.

use std::time::Duration;

use navigation_types::{RouteRequest, RouteResponse, Trip};
use tracing::debug;

use crate::RouteCalculator;
use crate::error::RoutingError;

/// Timeout applied to routing calls unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// Client for the GIS routing service.
#[derive(Debug, Clone)]
pub struct GisRoutingClient {
    client: reqwest::Client,
    base_url: String,
}

impl GisRoutingClient {
    /// Create a client for `base_url` (e.g. `http://gis:8080`) with the
    /// given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_route(&self, request: &RouteRequest) -> Result<Trip, RoutingError> {
        request.validate().map_err(RoutingError::InvalidRequest)?;

        let url = format!("{}/route", self.base_url);
        debug!(url, stops = request.locations.len(), "requesting route");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RoutingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: RouteResponse = serde_json::from_slice(&bytes)?;
        envelope.data.into_iter().next().ok_or(RoutingError::NoRoute)
    }
}

impl RouteCalculator for GisRoutingClient {
    async fn calculate_route(&self, request: &RouteRequest) -> Result<Trip, RoutingError> {
        self.post_route(request).await
    }
}
