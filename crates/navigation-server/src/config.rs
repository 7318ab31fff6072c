//! Configuration for the navigation server.
//!
//! Everything is read from environment variables; every variable has a
//! default suited to a local setup.

use std::time::Duration;

use navigation_incidents::{DEFAULT_MAX_CONCURRENT, IncidentFeed};

use crate::error::ServerError;

/// Which broker the incident events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Redis pub/sub.
    Redis,
    /// NATS.
    Nats,
}

/// Where sessions are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// `Dragonfly` / Redis.
    Dragonfly,
    /// In-process map, single instance development only.
    Memory,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Debug level, human readable logs.
    Dev,
    /// Info level, JSON logs.
    Prod,
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub http: navigation_gateway::ServerConfig,
    /// Redis URL used by the session store and the Redis feed.
    pub redis_url: String,
    /// Channel (or subject) carrying incident events.
    pub incidents_channel: String,
    /// Incident feed broker.
    pub feed: FeedKind,
    /// NATS URL, used with [`FeedKind::Nats`].
    pub nats_url: String,
    /// Session store backend.
    pub session_store: StoreKind,
    /// Sliding expiry of stored sessions.
    pub session_ttl: Duration,
    /// Base URL of the GIS routing service.
    pub gis_base_url: String,
    /// Timeout of routing requests.
    pub routing_timeout: Duration,
    /// Admission gate size of the incident subscriber.
    pub max_concurrent_handlers: usize,
    /// Deployment environment.
    pub environment: Environment,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `API_SERVER_HOST` (default `0.0.0.0`), `API_SERVER_PORT` (`8080`)
    /// - `REDIS_HOST` (`localhost`), `REDIS_PORT` (`6379`)
    /// - `REDIS_INCIDENTS_CHANNEL` (`incidents`)
    /// - `INCIDENT_FEED` -- `redis` or `nats` (`redis`)
    /// - `NATS_URL` (`nats://localhost:4222`)
    /// - `SESSION_STORE` -- `dragonfly` or `memory` (`dragonfly`)
    /// - `SESSION_TTL_SECS` (`1800`)
    /// - `SUPMAP_GIS_HOST` (`localhost`), `SUPMAP_GIS_PORT` (`8080`)
    /// - `ROUTING_TIMEOUT_MS` (`7000`)
    /// - `MAX_CONCURRENT_HANDLERS` (`10`)
    /// - `NAVIGATION_ENV` -- `dev` or `prod` (`prod`)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_owned());

        let port: u16 = parse(&var("API_SERVER_PORT", "8080"), "API_SERVER_PORT")?;
        let redis_port: u16 = parse(&var("REDIS_PORT", "6379"), "REDIS_PORT")?;
        let gis_port: u16 = parse(&var("SUPMAP_GIS_PORT", "8080"), "SUPMAP_GIS_PORT")?;
        let ttl_secs: u64 = parse(&var("SESSION_TTL_SECS", "1800"), "SESSION_TTL_SECS")?;
        let timeout_ms: u64 = parse(&var("ROUTING_TIMEOUT_MS", "7000"), "ROUTING_TIMEOUT_MS")?;
        let max_concurrent_handlers: usize = parse(
            &var("MAX_CONCURRENT_HANDLERS", &DEFAULT_MAX_CONCURRENT.to_string()),
            "MAX_CONCURRENT_HANDLERS",
        )?;
        if max_concurrent_handlers == 0 {
            return Err(ServerError::Config(String::from(
                "MAX_CONCURRENT_HANDLERS must be at least 1",
            )));
        }

        let feed = match var("INCIDENT_FEED", "redis").to_lowercase().as_str() {
            "redis" => FeedKind::Redis,
            "nats" => FeedKind::Nats,
            other => {
                return Err(ServerError::Config(format!("unknown INCIDENT_FEED: {other}")));
            }
        };
        let session_store = match var("SESSION_STORE", "dragonfly").to_lowercase().as_str() {
            "dragonfly" | "redis" => StoreKind::Dragonfly,
            "memory" => StoreKind::Memory,
            other => {
                return Err(ServerError::Config(format!("unknown SESSION_STORE: {other}")));
            }
        };
        let environment = match var("NAVIGATION_ENV", "prod").to_lowercase().as_str() {
            "dev" => Environment::Dev,
            _ => Environment::Prod,
        };

        Ok(Self {
            http: navigation_gateway::ServerConfig {
                host: var("API_SERVER_HOST", "0.0.0.0"),
                port,
            },
            redis_url: format!("redis://{}:{redis_port}", var("REDIS_HOST", "localhost")),
            incidents_channel: var("REDIS_INCIDENTS_CHANNEL", "incidents"),
            feed,
            nats_url: var("NATS_URL", "nats://localhost:4222"),
            session_store,
            session_ttl: Duration::from_secs(ttl_secs),
            gis_base_url: format!("http://{}:{gis_port}", var("SUPMAP_GIS_HOST", "localhost")),
            routing_timeout: Duration::from_millis(timeout_ms),
            max_concurrent_handlers,
            environment,
        })
    }

    /// The incident feed described by this configuration.
    pub fn incident_feed(&self) -> IncidentFeed {
        match self.feed {
            FeedKind::Redis => IncidentFeed::Redis {
                url: self.redis_url.clone(),
                channel: self.incidents_channel.clone(),
            },
            FeedKind::Nats => IncidentFeed::Nats {
                url: self.nats_url.clone(),
                subject: self.incidents_channel.clone(),
            },
        }
    }
}

fn parse<T>(value: &str, name: &str) -> Result<T, ServerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid {name}: {e}")))
}
