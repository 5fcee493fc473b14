use crate::error::DispatchResult;
use crate::model::{Session, UserId};
use crate::store::SessionStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::debug;

const CLEANUP_INTERVAL_SECS: i64 = 60;

struct Entry {
    session: Session,
    evicted: bool,
}

impl Entry {
    fn new(user: &UserId) -> Self {
        Self {
            session: Session::new(user.clone()),
            evicted: false,
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: OffsetDateTime) -> bool {
        match ttl {
            Some(ttl) => now >= self.session.updated_at + ttl,
            None => false,
        }
    }
}

type Slot = Arc<Mutex<Entry>>;

/// In-memory implementation backed by a concurrent hash map with one mutex per user.
///
/// The map shard lock is only held long enough to fetch or insert a slot; the
/// per-user mutex serializes updates for that user alone.
pub struct InMemorySessionStore {
    entries: DashMap<UserId, Slot>,
    ttl: Option<Duration>,
    cleanup_hint: Mutex<OffsetDateTime>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(0)
    }
}

impl InMemorySessionStore {
    /// Constructs a store that never evicts sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a store that drops sessions idle for `ttl_secs`. Zero disables eviction.
    /// Expiration is handled lazily on access.
    pub fn with_ttl(ttl_secs: u32) -> Self {
        let ttl = (ttl_secs > 0).then(|| Duration::seconds(i64::from(ttl_secs)));
        Self {
            entries: DashMap::new(),
            ttl,
            cleanup_hint: Mutex::new(OffsetDateTime::now_utc()),
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn slot(&self, user: &UserId) -> Slot {
        if let Some(slot) = self.entries.get(user) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .entries
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Entry::new(user))));
        Arc::clone(slot.value())
    }

    fn maybe_cleanup(&self, now: OffsetDateTime) {
        let Some(ttl) = self.ttl else {
            return;
        };
        // Another caller is already sweeping or checking; skip rather than wait.
        let Some(mut guard) = self.cleanup_hint.try_lock() else {
            return;
        };
        if now - *guard < Duration::seconds(CLEANUP_INTERVAL_SECS) {
            return;
        }

        let before = self.entries.len();
        // Slots that are locked are in use and therefore not idle.
        self.entries.retain(|_, slot| match slot.try_lock() {
            Some(mut entry) if entry.is_expired(Some(ttl), now) => {
                entry.evicted = true;
                false
            }
            _ => true,
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "evicted idle sessions");
        }

        *guard = now;
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user: &UserId) -> Session {
        let now = Self::now();
        self.maybe_cleanup(now);
        loop {
            let slot = self.slot(user);
            let mut entry = slot.lock();
            if entry.evicted {
                continue;
            }
            if entry.is_expired(self.ttl, now) {
                debug!(user = %user, "idle session expired on read");
                *entry = Entry::new(user);
            }
            return entry.session.clone();
        }
    }

    fn update(
        &self,
        user: &UserId,
        mutator: &mut dyn FnMut(&mut Session) -> DispatchResult<()>,
    ) -> DispatchResult<Session> {
        let now = Self::now();
        self.maybe_cleanup(now);
        loop {
            let slot = self.slot(user);
            let mut entry = slot.lock();
            if entry.evicted {
                // Swept between lookup and lock; fetch the replacement slot.
                continue;
            }
            if entry.is_expired(self.ttl, now) {
                *entry = Entry::new(user);
            }

            let mut draft = entry.session.clone();
            mutator(&mut draft)?;
            draft.updated_at = now;
            entry.session = draft;
            return Ok(entry.session.clone());
        }
    }

    fn remove(&self, user: &UserId) -> bool {
        match self.entries.remove(user) {
            Some((_, slot)) => {
                slot.lock().evicted = true;
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DispatchError, ValidationError};
    use crate::model::SessionState;

    #[test]
    fn get_creates_idle_session_lazily() {
        let store = InMemorySessionStore::new();
        let user = UserId::new("lazy");
        assert!(store.is_empty());
        let session = store.get(&user);
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(session.user_id, user);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_mutator_leaves_session_untouched() {
        let store = InMemorySessionStore::new();
        let user = UserId::new("rollback");
        let before = store.get(&user);
        let err = store
            .update(&user, &mut |session| {
                session.last_query = "half-written".into();
                Err(ValidationError::EmptyQuery.into())
            })
            .expect_err("mutator error propagates");
        assert_eq!(err, DispatchError::Validation(ValidationError::EmptyQuery));
        assert_eq!(store.get(&user), before);
    }

    #[test]
    fn busy_sweep_does_not_block_access() {
        let store = InMemorySessionStore::with_ttl(30);
        let held = store.cleanup_hint.lock();
        let user = UserId::new("busy");
        store
            .update(&user, &mut |session| {
                session.last_query = "through".into();
                Ok(())
            })
            .expect("update while sweep lock is held");
        assert_eq!(store.get(&user).last_query, "through");
        drop(held);
    }

    #[test]
    fn removed_session_starts_fresh() {
        let store = InMemorySessionStore::new();
        let user = UserId::new("gone");
        store
            .update(&user, &mut |session| {
                session.last_query = "kept".into();
                Ok(())
            })
            .expect("update");
        assert!(store.remove(&user));
        assert!(!store.remove(&user));
        assert!(store.get(&user).last_query.is_empty());
    }
}
