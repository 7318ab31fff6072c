//! Session persistence for Supmap navigation.
//!
//! Sessions live in `Dragonfly` (Redis-compatible) under
//! `navigation:session:{id}` with a sliding expiry: every write refreshes
//! the TTL, so sessions of clients that stopped reporting are reclaimed by
//! the store itself. An in-memory store with the same contract backs
//! single-process development and tests.
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` connection and typed JSON operations
//! - [`memory`] -- In-process session store
//! - [`store`] -- [`SessionStore`], the capability the gateway and the
//!   incident multicaster consume
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::{DragonflyPool, DragonflySessionStore};
pub use error::DbError;
pub use memory::MemorySessionStore;
pub use store::{SessionStore, session_key};
