use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const DEFAULT_MAX_SESSIONS: usize = 1000;
const DEFAULT_IDLE_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub idle_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: Duration::seconds(DEFAULT_IDLE_SECS),
        }
    }
}

impl SessionLimits {
    /// `LIFETOOLS_MAX_SESSIONS` and `LIFETOOLS_SESSION_IDLE_SECS`; bad values keep the defaults.
    pub fn from_env() -> Self {
        let max_sessions = std::env::var("LIFETOOLS_MAX_SESSIONS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_SESSIONS);
        let idle_secs = std::env::var("LIFETOOLS_SESSION_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_IDLE_SECS);
        Self {
            max_sessions,
            idle_timeout: Duration::seconds(idle_secs),
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    value: T,
    last_used: DateTime<Utc>,
    /// Breaks ties between equal timestamps.
    use_seq: u64,
}

/// In-memory sessions keyed by id.
///
/// Entries idle for longer than `idle_timeout` are dropped; inserting into a full store evicts
/// the least recently used entry.
#[derive(Debug)]
pub struct SessionStore<T> {
    entries: HashMap<Uuid, Entry<T>>,
    limits: SessionLimits,
    next_seq: u64,
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new(SessionLimits::default())
    }
}

impl<T> SessionStore<T> {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            entries: HashMap::new(),
            limits,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, value: T, now: DateTime<Utc>) -> Uuid {
        self.purge_expired(now);
        while self.entries.len() >= self.limits.max_sessions {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.last_used, e.use_seq))
                .map(|(id, _)| *id)
            else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::info!(id = %oldest, "session evicted");
        }

        let id = Uuid::new_v4();
        let use_seq = self.bump_seq();
        self.entries.insert(
            id,
            Entry {
                value,
                last_used: now,
                use_seq,
            },
        );
        id
    }

    /// Live session for `id`, marked as used at `now`.
    pub fn get_mut(&mut self, id: &Uuid, now: DateTime<Utc>) -> Option<&mut T> {
        let expired = self
            .entries
            .get(id)
            .is_some_and(|e| now - e.last_used > self.limits.idle_timeout);
        if expired {
            self.entries.remove(id);
            tracing::debug!(%id, "session expired");
            return None;
        }

        let use_seq = self.bump_seq();
        let entry = self.entries.get_mut(id)?;
        entry.last_used = now;
        entry.use_seq = use_seq;
        Some(&mut entry.value)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.entries.remove(id).map(|e| e.value)
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let timeout = self.limits.idle_timeout;
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.last_used <= timeout);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired sessions purged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_sessions: usize, idle_secs: i64) -> SessionLimits {
        SessionLimits {
            max_sessions,
            idle_timeout: Duration::seconds(idle_secs),
        }
    }

    #[test]
    fn full_store_evicts_least_recently_used() {
        let t0 = Utc::now();
        let mut store = SessionStore::new(limits(2, 600));
        let a = store.insert("a", t0);
        let b = store.insert("b", t0 + Duration::seconds(1));
        // Touching `a` makes `b` the oldest.
        assert!(store.get_mut(&a, t0 + Duration::seconds(2)).is_some());

        let c = store.insert("c", t0 + Duration::seconds(3));
        assert_eq!(store.len(), 2);
        assert!(store.get_mut(&b, t0 + Duration::seconds(4)).is_none());
        assert_eq!(store.get_mut(&a, t0 + Duration::seconds(4)).copied(), Some("a"));
        assert_eq!(store.get_mut(&c, t0 + Duration::seconds(4)).copied(), Some("c"));
    }

    #[test]
    fn equal_timestamps_evict_in_use_order() {
        let now = Utc::now();
        let mut store = SessionStore::new(limits(2, 600));
        let a = store.insert('a', now);
        let b = store.insert('b', now);
        store.get_mut(&a, now);
        store.insert('c', now);
        assert!(store.get_mut(&b, now).is_none());
        assert!(store.get_mut(&a, now).is_some());
    }

    #[test]
    fn idle_sessions_expire() {
        let t0 = Utc::now();
        let mut store = SessionStore::new(limits(10, 60));
        let a = store.insert(1, t0);
        let b = store.insert(2, t0);

        assert!(store.get_mut(&a, t0 + Duration::seconds(60)).is_some());
        assert!(store.get_mut(&b, t0 + Duration::seconds(61)).is_none());
        assert_eq!(store.len(), 1);

        store.insert(3, t0 + Duration::seconds(200));
        assert_eq!(store.len(), 1, "stale entries are purged on insert");
    }

    #[test]
    fn removed_sessions_are_gone() {
        let mut store = SessionStore::default();
        let id = store.insert("x", Utc::now());
        assert_eq!(store.remove(&id), Some("x"));
        assert_eq!(store.remove(&id), None);
        assert!(store.get_mut(&id, Utc::now()).is_none());
    }
}
