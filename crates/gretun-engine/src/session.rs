//! In-memory registry of per-operator conversation state
//!
//! State is keyed by session id and expires after an idle TTL. Callers take
//! the state out, process the turn, and put the updated state back, so no
//! map lock is held across an await point.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

struct Entry<T> {
    state: T,
    last_active: Instant,
}

/// Concurrent session map with idle expiry
pub struct SessionRegistry<T> {
    inner: DashMap<String, Entry<T>>,
    ttl: Duration,
}

impl<T: Default> SessionRegistry<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Remove the session's state for processing, creating a fresh default
    /// for unknown or expired sessions.
    pub fn take(&self, session_id: &str) -> T {
        match self.inner.remove(session_id) {
            Some((_, entry)) if entry.last_active.elapsed() < self.ttl => entry.state,
            Some(_) => {
                debug!("Session {} expired, starting fresh", session_id);
                T::default()
            }
            None => T::default(),
        }
    }

    /// Store the session's state after processing, refreshing its idle timer
    pub fn put(&self, session_id: &str, state: T) {
        self.inner.insert(
            session_id.to_string(),
            Entry {
                state,
                last_active: Instant::now(),
            },
        );
    }

    /// Drop every session idle past the TTL, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        // Counted inside the closure; comparing map lengths would misreport
        // under concurrent inserts.
        let mut removed = 0;
        self.inner.retain(|_, entry| {
            let keep = entry.last_active.elapsed() < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!("Swept {} expired sessions", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
