//! The session store capability.
//!
//! [`SessionStore`] uses enum dispatch over the concrete stores instead of
//! a trait object, since async methods are not dyn-compatible.

use navigation_types::{Session, SessionId};

use crate::dragonfly::DragonflySessionStore;
use crate::error::DbError;
use crate::memory::MemorySessionStore;

/// Key under which a session is stored.
pub fn session_key(id: &SessionId) -> String {
    format!("navigation:session:{id}")
}

/// Where navigation sessions are persisted.
///
/// Individual operations are atomic per key; read-modify-write sequences
/// are not, callers serialize them per session.
#[derive(Clone)]
pub enum SessionStore {
    /// `Dragonfly` / Redis.
    Dragonfly(DragonflySessionStore),
    /// In-process map.
    Memory(MemorySessionStore),
}

impl SessionStore {
    /// Upsert a session and refresh its expiry.
    pub async fn set(&self, session: &Session) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(store) => store.set_session(session).await,
            Self::Memory(store) => store.set_session(session).await,
        }
    }

    /// Fetch a session, `None` if it does not exist.
    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
        match self {
            Self::Dragonfly(store) => store.get_session(id).await,
            Self::Memory(store) => store.get_session(id).await,
        }
    }

    /// Delete a session.
    pub async fn delete(&self, id: &SessionId) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(store) => store.delete_session(id).await,
            Self::Memory(store) => store.delete_session(id).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<MemorySessionStore> for SessionStore {
    fn from(store: MemorySessionStore) -> Self {
        Self::Memory(store)
    }
}

impl From<DragonflySessionStore> for SessionStore {
    fn from(store: DragonflySessionStore) -> Self {
        Self::Dragonfly(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced() {
        assert_eq!(
            session_key(&SessionId::new("abc")),
            "navigation:session:abc"
        );
    }
}
