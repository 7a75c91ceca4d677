//! Progress tracking for long running operations.
//!
//! A [`StatsRegistry`] maps an operation key (report run id, post id, ...)
//! to a [`Stat`]. Registration is the only guard against running the same
//! operation twice at once. Operations hold a [`StatGuard`] which removes
//! the entry when it goes out of scope, so failed operations do not leave
//! stale "in progress" records behind.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Initial total of a freshly registered stat; progress starts out as a percentage.
const INITIAL_TOTAL: u64 = 100;

/// Point-in-time copy of a [`Stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub is_created: bool,
    pub current: u64,
    pub total: u64,
}

#[derive(Debug)]
struct StatState {
    is_created: bool,
    total: u64,
}

/// Mutable progress record of one operation.
#[derive(Debug)]
pub struct Stat {
    state: Mutex<StatState>,
    current: AtomicU64,
}

impl Default for Stat {
    fn default() -> Self {
        Self {
            state: Mutex::new(StatState {
                is_created: false,
                total: INITIAL_TOTAL,
            }),
            current: AtomicU64::new(0),
        }
    }
}

impl Stat {
    /// Mark the remote job as existing and restart progress at 0/0.
    pub fn set_created(&self) {
        let mut state = self.state.lock();
        state.is_created = true;
        state.total = 0;
        self.current.store(0, Ordering::Relaxed);
    }

    pub fn set_progress(&self, current: u64, total: u64) {
        let mut state = self.state.lock();
        state.total = total;
        self.current.store(current, Ordering::Relaxed);
    }

    /// Replace the total, leaving the current count alone.
    pub fn set_total(&self, total: u64) {
        self.state.lock().total = total;
    }

    /// Add `delta` to the current count without taking the lock.
    pub fn add(&self, delta: u64) {
        self.current.fetch_add(delta, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatSnapshot {
        let state = self.state.lock();
        StatSnapshot {
            is_created: state.is_created,
            current: self.current.load(Ordering::Relaxed),
            total: state.total,
        }
    }
}

/// Shared registry of in-flight operations. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct StatsRegistry {
    stats: Arc<Mutex<HashMap<String, Arc<Stat>>>>,
}

impl StatsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`, or return `None` if an operation with this key is
    /// already registered.
    #[must_use]
    pub fn register(&self, key: impl Into<String>) -> Option<StatGuard> {
        let key = key.into();
        let mut stats = self.stats.lock();
        if stats.contains_key(&key) {
            return None;
        }
        let stat = Arc::new(Stat::default());
        stats.insert(key.clone(), Arc::clone(&stat));
        drop(stats);

        Some(StatGuard {
            registry: self.clone(),
            key,
            stat,
        })
    }

    /// Remove `key` regardless of who registered it.
    pub fn unregister(&self, key: &str) {
        self.stats.lock().remove(key);
    }

    /// Copy of every tracked record.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, StatSnapshot> {
        self.stats
            .lock()
            .iter()
            .map(|(key, stat)| (key.clone(), stat.snapshot()))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.stats.lock().contains_key(key)
    }

    /// Remove `key` only if it still refers to `stat`.
    fn release(&self, key: &str, stat: &Arc<Stat>) {
        let mut stats = self.stats.lock();
        if stats.get(key).is_some_and(|current| Arc::ptr_eq(current, stat)) {
            stats.remove(key);
        }
    }
}

/// Registration handle; unregisters its key when dropped.
#[derive(Debug)]
pub struct StatGuard {
    registry: StatsRegistry,
    key: String,
    stat: Arc<Stat>,
}

impl StatGuard {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Shared handle for attaching to a [`CallContext`](crate::CallContext).
    #[must_use]
    pub fn stat(&self) -> Arc<Stat> {
        Arc::clone(&self.stat)
    }
}

impl Deref for StatGuard {
    type Target = Stat;

    fn deref(&self) -> &Stat {
        &self.stat
    }
}

impl Drop for StatGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key, &self.stat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_returns_none() {
        let registry = StatsRegistry::new();
        let first = registry.register("X");
        assert!(first.is_some());
        assert!(registry.register("X").is_none());

        registry.unregister("X");
        assert!(registry.register("X").is_some());
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let registry = StatsRegistry::new();
        {
            let _guard = registry.register("run-1").unwrap();
            assert!(registry.contains("run-1"));
        }
        assert!(!registry.contains("run-1"));
    }

    #[test]
    fn test_stale_guard_keeps_newer_registration() {
        let registry = StatsRegistry::new();
        let stale = registry.register("k").unwrap();
        registry.unregister("k");
        let fresh = registry.register("k").unwrap();
        drop(stale);
        assert!(registry.contains("k"));
        drop(fresh);
        assert!(!registry.contains("k"));
    }

    #[test]
    fn test_stat_lifecycle() {
        let registry = StatsRegistry::new();
        let guard = registry.register("run").unwrap();
        assert_eq!(
            registry.snapshot()["run"],
            StatSnapshot {
                is_created: false,
                current: 0,
                total: 100,
            }
        );

        guard.set_progress(40, 100);
        assert_eq!(registry.snapshot()["run"].current, 40);

        guard.set_created();
        guard.add(3);
        guard.add(4);
        assert_eq!(
            registry.snapshot()["run"],
            StatSnapshot {
                is_created: true,
                current: 7,
                total: 0,
            }
        );
    }

    #[test]
    fn test_set_total_keeps_current() {
        let stat = Stat::default();
        stat.set_created();
        stat.add(12);
        stat.set_total(30);
        assert_eq!(
            stat.snapshot(),
            StatSnapshot {
                is_created: true,
                current: 12,
                total: 30,
            }
        );
    }

    #[test]
    fn test_snapshot_is_independent() {
        let registry = StatsRegistry::new();
        let guard = registry.register("a").unwrap();
        let before = registry.snapshot();
        guard.add(10);
        assert_eq!(before["a"].current, 0);
        assert_eq!(registry.snapshot()["a"].current, 10);
    }

    #[test]
    fn test_concurrent_adds() {
        let registry = StatsRegistry::new();
        let guard = registry.register("hot").unwrap();
        let stat = guard.stat();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stat = Arc::clone(&stat);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stat.add(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(guard.snapshot().current, 8000);
    }
}
