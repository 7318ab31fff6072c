//! Incident feed sources.
//!
//! Each source yields the raw payloads published on one channel as a
//! stream of byte buffers. The stream ends when the broker closes the
//! subscription.

use fred::prelude::*;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::error::IncidentError;

/// Raw incident event payloads, in publication order.
pub type RawEvents = BoxStream<'static, Vec<u8>>;

/// Where incident events are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentFeed {
    /// A Redis pub/sub channel.
    Redis {
        /// Redis URL (`redis://host:port`).
        url: String,
        /// Channel name.
        channel: String,
    },
    /// A NATS subject.
    Nats {
        /// NATS URL (`nats://host:port`).
        url: String,
        /// Subject name.
        subject: String,
    },
}

impl IncidentFeed {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Redis { .. } => "redis",
            Self::Nats { .. } => "nats",
        }
    }

    /// Connect and subscribe.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError`] if the URL is invalid or the broker
    /// refuses the connection or the subscription.
    pub async fn subscribe(&self) -> Result<RawEvents, IncidentError> {
        match self {
            Self::Redis { url, channel } => subscribe_redis(url, channel).await,
            Self::Nats { url, subject } => subscribe_nats(url, subject).await,
        }
    }
}

async fn subscribe_redis(url: &str, channel: &str) -> Result<RawEvents, IncidentError> {
    let config = Config::from_url(url)
        .map_err(|e| IncidentError::Config(format!("invalid Redis URL: {e}")))?;

    // A client in subscriber mode cannot run other commands, so the feed
    // gets its own connection.
    let client = Builder::from_config(config).build()?;
    client.init().await?;
    let rx = client.message_rx();
    client.subscribe(channel).await?;
    info!(channel, "subscribed to Redis incident channel");

    let events = stream::unfold((client, rx), |(client, mut rx)| async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if let Some(bytes) = message.value.as_bytes() {
                        let payload = bytes.to_vec();
                        return Some((payload, (client, rx)));
                    }
                    warn!(channel = %message.channel, "non-binary pubsub payload skipped");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "incident feed lagged, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Ok(events.boxed())
}

async fn subscribe_nats(url: &str, subject: &str) -> Result<RawEvents, IncidentError> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| IncidentError::Nats(format!("failed to connect to {url}: {e}")))?;
    let subscriber = client
        .subscribe(subject.to_owned())
        .await
        .map_err(|e| IncidentError::Nats(format!("failed to subscribe to {subject}: {e}")))?;
    info!(subject, "subscribed to NATS incident subject");

    let events = stream::unfold((client, subscriber), |(client, mut subscriber)| async move {
        let message = subscriber.next().await?;
        Some((message.payload.to_vec(), (client, subscriber)))
    });
    Ok(events.boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_names() {
        let redis = IncidentFeed::Redis {
            url: String::from("redis://localhost:6379"),
            channel: String::from("incidents"),
        };
        let nats = IncidentFeed::Nats {
            url: String::from("nats://localhost:4222"),
            subject: String::from("incidents"),
        };
        assert_eq!(redis.name(), "redis");
        assert_eq!(nats.name(), "nats");
    }

    #[tokio::test]
    async fn invalid_redis_url_is_a_config_error() {
        let feed = IncidentFeed::Redis {
            url: String::from("not a url"),
            channel: String::from("incidents"),
        };
        assert!(matches!(feed.subscribe().await, Err(IncidentError::Config(_))));
    }
}
