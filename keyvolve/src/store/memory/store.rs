use crate::common::Value;
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::store::{StoreProvider, Transaction, TxnOp};
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory ordered key-value store backed by a concurrent skip list.
///
/// # Purpose
/// Reference implementation of [StoreProvider] used for tests and for
/// embedding the engine without a persistent backend. Keys iterate in
/// lexicographic order, which gives `scan_prefix` its ascending guarantee.
///
/// # Characteristics
/// - **Thread-Safe**: can be cloned and shared across threads
/// - **Ordered**: O(log n) operations over a concurrent skip list
/// - **Atomic commits**: a single commit lock makes precondition checks and
///   batch application one indivisible step
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(MemoryStoreInner {
                backing: SkipMap::new(),
                commit_lock: Mutex::new(()),
            }),
        }
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    backing: SkipMap<String, Value>,
    // Writes and commits serialize on this lock; reads are lock-free.
    commit_lock: Mutex<()>,
}

impl StoreProvider for MemoryStore {
    fn get(&self, key: &str) -> KeyvolveResult<Option<Value>> {
        Ok(self.inner.backing.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, key: &str, value: Value) -> KeyvolveResult<()> {
        let _guard = self.inner.commit_lock.lock();
        self.inner.backing.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> KeyvolveResult<Option<Value>> {
        let _guard = self.inner.commit_lock.lock();
        Ok(self.inner.backing.remove(key).map(|e| e.value().clone()))
    }

    fn contains_key(&self, key: &str) -> KeyvolveResult<bool> {
        Ok(self.inner.backing.contains_key(key))
    }

    fn scan_prefix(&self, prefix: &str) -> KeyvolveResult<Vec<(String, Value)>> {
        let entries = self
            .inner
            .backing
            .range(prefix.to_string()..)
            .take_while(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(entries)
    }

    fn commit(&self, txn: Transaction) -> KeyvolveResult<()> {
        let _guard = self.inner.commit_lock.lock();
        let (preconditions, ops) = txn.into_parts();

        for pre in &preconditions {
            let actual = self
                .inner
                .backing
                .get(pre.key.as_str())
                .map(|e| e.value().clone());
            if actual != pre.expected {
                log::debug!(
                    "Commit precondition failed for key {}: expected {:?}, found {:?}",
                    pre.key,
                    pre.expected,
                    actual
                );
                return Err(KeyvolveError::new(
                    &format!("Commit precondition failed for key {}", pre.key),
                    ErrorKind::TransactionConflict,
                ));
            }
        }

        for op in ops {
            match op {
                TxnOp::Put { key, value } => {
                    self.inner.backing.insert(key, value);
                }
                TxnOp::Delete { key } => {
                    self.inner.backing.remove(key.as_str());
                }
            }
        }

        Ok(())
    }

    fn clear(&self) -> KeyvolveResult<()> {
        let _guard = self.inner.commit_lock.lock();
        while self.inner.backing.pop_front().is_some() {}
        Ok(())
    }

    fn size(&self) -> KeyvolveResult<u64> {
        Ok(self.inner.backing.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = MemoryStore::new();
        store.put("k1", Value::from("v1")).unwrap();
        assert_eq!(store.get("k1").unwrap(), Some(Value::from("v1")));
        assert!(store.contains_key("k1").unwrap());

        assert_eq!(store.remove("k1").unwrap(), Some(Value::from("v1")));
        assert_eq!(store.get("k1").unwrap(), None);
        assert_eq!(store.remove("k1").unwrap(), None);
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put("k", Value::I64(1)).unwrap();
        store.put("k", Value::I64(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(Value::I64(2)));
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_scan_prefix_ordered() {
        let store = MemoryStore::new();
        store.put("users:3", Value::I64(3)).unwrap();
        store.put("users:1", Value::I64(1)).unwrap();
        store.put("orders:1", Value::I64(9)).unwrap();
        store.put("users:2", Value::I64(2)).unwrap();

        let entries = store.scan_prefix("users:").unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["users:1", "users:2", "users:3"]);
    }

    #[test]
    fn test_scan_prefix_excludes_neighbours() {
        let store = MemoryStore::new();
        store.put("user:1", Value::I64(1)).unwrap();
        store.put("users:1", Value::I64(2)).unwrap();
        store.put("userz:1", Value::I64(3)).unwrap();

        let entries = store.scan_prefix("users:").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "users:1");
    }

    #[test]
    fn test_scan_prefix_empty() {
        let store = MemoryStore::new();
        assert!(store.scan_prefix("none:").unwrap().is_empty());
    }

    #[test]
    fn test_commit_applies_all_ops() {
        let store = MemoryStore::new();
        store.put("old", Value::I64(1)).unwrap();

        let mut txn = Transaction::new();
        txn.put("a", 1i64);
        txn.put("b", 2i64);
        txn.delete("old");
        store.commit(txn).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(Value::I64(1)));
        assert_eq!(store.get("b").unwrap(), Some(Value::I64(2)));
        assert_eq!(store.get("old").unwrap(), None);
    }

    #[test]
    fn test_commit_precondition_value_matches() {
        let store = MemoryStore::new();
        store.put("version", Value::I64(1)).unwrap();

        let mut txn = Transaction::new();
        txn.expect_value("version", Some(Value::I64(1)));
        txn.put("version", 2i64);
        store.commit(txn).unwrap();
        assert_eq!(store.get("version").unwrap(), Some(Value::I64(2)));
    }

    #[test]
    fn test_commit_precondition_conflict_applies_nothing() {
        let store = MemoryStore::new();
        store.put("version", Value::I64(5)).unwrap();

        let mut txn = Transaction::new();
        txn.expect_value("version", Some(Value::I64(1)));
        txn.put("version", 2i64);
        txn.put("side_effect", 1i64);

        let err = store.commit(txn).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionConflict);
        assert_eq!(store.get("version").unwrap(), Some(Value::I64(5)));
        assert_eq!(store.get("side_effect").unwrap(), None);
    }

    #[test]
    fn test_commit_precondition_absence() {
        let store = MemoryStore::new();

        let mut txn = Transaction::new();
        txn.expect_value("seed", None);
        txn.put("seed", 0i64);
        store.commit(txn).unwrap();

        // Second identical commit now conflicts: the key exists.
        let mut txn = Transaction::new();
        txn.expect_value("seed", None);
        txn.put("seed", 0i64);
        let err = store.commit(txn).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionConflict);
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.put("a", Value::I64(1)).unwrap();
        store.put("b", Value::I64(2)).unwrap();
        store.clear().unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let store = MemoryStore::new();
        let mut txn = Transaction::new();
        txn.delete("ghost");
        store.commit(txn).unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }
}
