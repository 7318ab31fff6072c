//! `Dragonfly` (Redis-compatible) session operations.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Expiry | Description |
//! |---------|------|--------|-------------|
//! | `navigation:session:{id}` | JSON | sliding TTL | Full navigation session |

use std::time::Duration;

use fred::prelude::*;
use fred::types::Expiration;
use navigation_types::{Session, SessionId};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;
use crate::store::session_key;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and provides typed JSON operations.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(url, "Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Serialize `value` as JSON and store it at `key`, expiring after `ttl`.
    ///
    /// Every call resets the expiry. A TTL below one second is rounded up.
    pub async fn set_json_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let seconds = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        let _: () = self
            .client
            .set(key, json.as_str(), Some(Expiration::EX(seconds)), None, false)
            .await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize it from JSON.
    ///
    /// Returns `Ok(None)` when the key does not exist (or has expired).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

/// Session store backed by `Dragonfly`.
#[derive(Clone)]
pub struct DragonflySessionStore {
    pool: DragonflyPool,
    ttl: Duration,
}

impl DragonflySessionStore {
    /// Wrap a connected pool; sessions expire `ttl` after their last write.
    pub const fn new(pool: DragonflyPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Store a session, refreshing its expiry.
    pub async fn set_session(&self, session: &Session) -> Result<(), DbError> {
        self.pool
            .set_json_ex(&session_key(&session.id), session, self.ttl)
            .await
    }

    /// Fetch a session, `None` if absent or expired.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
        self.pool.get_json(&session_key(id)).await
    }

    /// Delete a session.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), DbError> {
        self.pool.delete(&session_key(id)).await
    }
}
