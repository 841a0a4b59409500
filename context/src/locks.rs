//! Per-key async locks, used both to avoid a cache-recompute thundering
//! herd on a hot context id and to serialize delegation merges that target
//! the same tier.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `key`, creating it on first use. Stale entries
    /// are never evicted; the table is expected to stay bounded by the
    /// number of distinct tiers in active use.
    pub fn get(&self, key: K) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().expect("lock table poisoned");
        table.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_returns_the_same_mutex() {
        let locks: KeyedLocks<i64> = KeyedLocks::new();
        let a = locks.get(1);
        let b = locks.get(1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks: KeyedLocks<i64> = KeyedLocks::new();
        let a = locks.get(1);
        let b = locks.get(2);
        let _guard_a = a.lock().await;
        // Must not deadlock: different key, independent mutex.
        let _guard_b = b.lock().await;
    }
}
