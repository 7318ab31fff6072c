//! Incident ingestion for Supmap navigation.
//!
//! ```text
//! feed (Redis | NATS) --> Subscriber --> Multicaster --> Hub --> clients
//! ```
//!
//! - [`IncidentFeed`]: raw event payloads from the broker
//! - [`Subscriber`]: decode, validate, bounded concurrent dispatch
//! - [`Multicaster`]: relevance filter, optional route recalculation,
//!   per-client delivery

pub mod error;
pub mod feed;
pub mod multicast;
pub mod subscriber;

pub use error::IncidentError;
pub use feed::{IncidentFeed, RawEvents};
pub use multicast::{Multicaster, RELEVANCE_TOLERANCE_M};
pub use subscriber::{DEFAULT_MAX_CONCURRENT, IncidentHandler, Subscriber, decode_event};
