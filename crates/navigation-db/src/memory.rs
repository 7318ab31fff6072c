//! In-process session store.
//!
//! Sessions are kept as serialized JSON so that reads go through the same
//! decode path as the `Dragonfly` store. Every write sweeps expired entries,
//! so sessions that are never read again are still reclaimed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use navigation_types::{Session, SessionId};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::DbError;

#[derive(Debug)]
struct Entry {
    json: String,
    written_at: Instant,
}

/// Session store held in memory, shared between clones.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Create an empty store whose entries expire `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Store a session, refreshing its expiry.
    pub async fn set_session(&self, session: &Session) -> Result<(), DbError> {
        let json = serde_json::to_string(session)?;
        let entry = Entry {
            json,
            written_at: Instant::now(),
        };
        let mut entries = self.entries.write().await;
        self.sweep(&mut entries);
        entries.insert(session.id.clone(), entry);
        Ok(())
    }

    /// Fetch a session, `None` if absent or expired.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => return Ok(None),
                Some(entry) if entry.written_at.elapsed() < self.ttl => {
                    return Ok(Some(serde_json::from_str(&entry.json)?));
                }
                Some(_) => {}
            }
        }

        // Expired: reclaim unless a writer refreshed it in the meantime.
        let mut entries = self.entries.write().await;
        if entries
            .get(id)
            .is_some_and(|entry| entry.written_at.elapsed() >= self.ttl)
        {
            entries.remove(id);
        }
        Ok(None)
    }

    /// Delete a session.
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), DbError> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    /// Number of live sessions. Expired entries are reclaimed first.
    pub async fn len(&self) -> usize {
        let mut entries = self.entries.write().await;
        self.sweep(&mut entries);
        entries.len()
    }

    /// Whether the store holds no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sweep(&self, entries: &mut HashMap<SessionId, Entry>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.written_at.elapsed() < self.ttl);
        let reclaimed = before.saturating_sub(entries.len());
        if reclaimed > 0 {
            debug!(reclaimed, "dropped expired sessions");
        }
    }
}
