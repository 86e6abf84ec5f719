//! Per-call conversation state and per-call serialization.
//!
//! [`ConversationStore`] is a plain keyed store. Ordering is provided
//! separately by [`CallLocks`]: the lifecycle handler holds a call's lock for
//! the whole get/mutate/put sequence, so two events for the same call never
//! interleave while different calls never contend.

use async_trait::async_trait;
use nexcall_types::Turn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

/// Live context of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub call_id: String,
    pub customer_phone: Option<String>,
    /// User and assistant turns in the order they happened.
    pub turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new(call_id: impl Into<String>, customer_phone: Option<String>) -> Self {
        Self {
            call_id: call_id.into(),
            customer_phone,
            turns: Vec::new(),
        }
    }
}

/// Keyed storage for live conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, call_id: &str) -> Option<ConversationState>;

    /// Inserts or replaces the state for `state.call_id`.
    async fn put(&self, state: ConversationState);

    /// Removes and returns the state, if any.
    async fn delete(&self, call_id: &str) -> Option<ConversationState>;

    /// Drops conversations untouched for at least `ttl`. Returns their ids.
    async fn evict_idle(&self, ttl: Duration) -> Vec<String>;

    async fn len(&self) -> usize;
}

struct Entry {
    state: ConversationState,
    last_activity: Instant,
}

/// Process-local [`ConversationStore`] for single-instance deployments.
///
/// Every operation is a brief map access that never spans an `.await`, so a
/// synchronous mutex is used.
#[derive(Default)]
pub struct InMemoryConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, call_id: &str) -> Option<ConversationState> {
        self.entries().get(call_id).map(|e| e.state.clone())
    }

    async fn put(&self, state: ConversationState) {
        let key = state.call_id.clone();
        self.entries().insert(
            key,
            Entry {
                state,
                last_activity: Instant::now(),
            },
        );
    }

    async fn delete(&self, call_id: &str) -> Option<ConversationState> {
        self.entries().remove(call_id).map(|e| e.state)
    }

    async fn evict_idle(&self, ttl: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        self.entries().retain(|call_id, entry| {
            let idle = entry.last_activity.elapsed() >= ttl;
            if idle {
                evicted.push(call_id.clone());
            }
            !idle
        });
        evicted
    }

    async fn len(&self) -> usize {
        self.entries().len()
    }
}

struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// Holders plus waiters, counted under the map lock.
    users: usize,
}

type LockMap = HashMap<String, Slot>;

/// One async mutex per call id, created on demand and dropped with its last
/// user.
#[derive(Clone, Default)]
pub struct CallLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl CallLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `call_id`.
    ///
    /// Dropping the returned future before it resolves releases the slot.
    pub async fn lock(&self, call_id: &str) -> CallLockGuard {
        let mutex = {
            let mut map = self.map();
            let slot = map.entry(call_id.to_string()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        let registration = Registration {
            call_id: call_id.to_string(),
            locks: self.clone(),
        };
        let guard = mutex.lock_owned().await;
        CallLockGuard {
            _guard: guard,
            registration,
        }
    }

    /// Number of call ids with a holder or waiter.
    pub fn held(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, call_id: &str) {
        let mut map = self.map();
        if let Some(slot) = map.get_mut(call_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                map.remove(call_id);
            }
        }
    }
}

/// One counted use of a slot, held from before the wait until the guard
/// is dropped.
struct Registration {
    call_id: String,
    locks: CallLocks,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.locks.release(&self.call_id);
    }
}

/// Exclusive access to one call until dropped.
pub struct CallLockGuard {
    _guard: OwnedMutexGuard<()>,
    registration: Registration,
}

impl CallLockGuard {
    pub fn call_id(&self) -> &str {
        &self.registration.call_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, turns: usize) -> ConversationState {
        let mut s = ConversationState::new(id, Some("+33600000000".into()));
        for i in 0..turns {
            s.turns.push(Turn::user(format!("turn {i}")));
        }
        s
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemoryConversationStore::new();
        assert!(store.get("C1").await.is_none());

        store.put(state("C1", 1)).await;
        assert_eq!(store.get("C1").await.unwrap().turns.len(), 1);

        store.put(state("C1", 2)).await;
        assert_eq!(store.get("C1").await.unwrap().turns.len(), 2);
        assert_eq!(store.len().await, 1);

        assert!(store.delete("C1").await.is_some());
        assert!(store.delete("C1").await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_only_idle_entries() {
        let store = InMemoryConversationStore::new();
        store.put(state("old", 0)).await;
        tokio::time::advance(Duration::from_secs(90)).await;
        store.put(state("fresh", 0)).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let evicted = store.evict_idle(Duration::from_secs(120)).await;
        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn lock_serializes_same_call() {
        let locks = CallLocks::new();
        let first = locks.lock("C1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("C1").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        // Other calls are not blocked.
        let other = locks.lock("C2").await;
        drop(other);

        drop(first);
        contender.await.unwrap();
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn entry_kept_while_waiters_queue() {
        let locks = CallLocks::new();
        let first = locks.lock("C1").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock("C1").await.call_id().to_string() })
        };
        tokio::task::yield_now().await;

        drop(first);
        assert_eq!(waiter.await.unwrap(), "C1");
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn abandoned_wait_releases_slot() {
        let locks = CallLocks::new();
        let first = locks.lock("C1").await;

        let mut waiter = Box::pin(locks.lock("C1"));
        tokio::select! {
            biased;
            _ = &mut waiter => panic!("lock acquired while held"),
            _ = tokio::task::yield_now() => {}
        }
        assert_eq!(locks.held(), 1);

        // Holder leaves first, then the queued waiter gives up.
        drop(first);
        drop(waiter);
        assert_eq!(locks.held(), 0);

        let again = locks.lock("C1").await;
        assert_eq!(again.call_id(), "C1");
        drop(again);
        assert_eq!(locks.held(), 0);
    }
}
