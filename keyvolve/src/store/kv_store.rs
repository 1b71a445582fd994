use crate::common::Value;
use crate::errors::KeyvolveResult;
use crate::store::memory::MemoryStore;
use crate::store::Transaction;
use std::ops::Deref;
use std::sync::Arc;

/// Low-level interface for ordered key-value store implementations.
///
/// # Purpose
/// Defines the contract that all store backends must implement. The engine
/// only requires point reads/writes, ascending prefix scans, and an atomic
/// multi-operation commit with optimistic preconditions; anything beyond
/// that is backend-private.
///
/// # Key Methods
/// - **Point operations**: `get()`, `put()`, `remove()`, `contains_key()`
/// - **Range scans**: `scan_prefix()` in ascending key order
/// - **Atomicity**: `commit()` applies a [Transaction] as one unit
/// - **Maintenance**: `clear()`, `size()`
///
/// # Thread Safety
/// Implementers must be `Send + Sync`. `commit()` must evaluate preconditions
/// and apply operations without interleaving other writes.
pub trait StoreProvider: Send + Sync {
    /// Retrieves the value associated with a key.
    fn get(&self, key: &str) -> KeyvolveResult<Option<Value>>;

    /// Inserts or updates a key-value pair.
    fn put(&self, key: &str, value: Value) -> KeyvolveResult<()>;

    /// Removes a key-value pair, returning the removed value if the key
    /// existed.
    fn remove(&self, key: &str) -> KeyvolveResult<Option<Value>>;

    /// Checks whether the store contains a key.
    fn contains_key(&self, key: &str) -> KeyvolveResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns all entries whose key starts with `prefix`, in ascending key
    /// order.
    fn scan_prefix(&self, prefix: &str) -> KeyvolveResult<Vec<(String, Value)>>;

    /// Atomically applies a [Transaction].
    ///
    /// Every precondition is evaluated against the current store state; if
    /// any no longer holds, nothing is applied and the commit fails with
    /// [`ErrorKind::TransactionConflict`](crate::errors::ErrorKind::TransactionConflict).
    fn commit(&self, txn: Transaction) -> KeyvolveResult<()>;

    /// Removes all entries from the store.
    fn clear(&self) -> KeyvolveResult<()>;

    /// Returns the number of entries in the store.
    fn size(&self) -> KeyvolveResult<u64>;
}

/// Cheap-clone handle to a store backend.
///
/// Wraps a concrete [StoreProvider] behind an `Arc` so the same store can be
/// shared by the migration manager, storage and schema utilities. Cloning a
/// `Store` only increments the reference count.
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StoreProvider>,
}

impl Deref for Store {
    type Target = Arc<dyn StoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Store {
    /// Wraps a provider implementation.
    pub fn new<T: StoreProvider + 'static>(inner: T) -> Self {
        Store {
            inner: Arc::new(inner),
        }
    }

    /// Creates a store backed by the in-memory reference implementation.
    pub fn in_memory() -> Self {
        Store::new(MemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, KeyvolveError};

    struct MockStore;

    impl StoreProvider for MockStore {
        fn get(&self, key: &str) -> KeyvolveResult<Option<Value>> {
            if key == "key1" {
                Ok(Some(Value::from("value1")))
            } else {
                Ok(None)
            }
        }

        fn put(&self, _key: &str, _value: Value) -> KeyvolveResult<()> {
            Ok(())
        }

        fn remove(&self, key: &str) -> KeyvolveResult<Option<Value>> {
            if key == "key1" {
                Ok(Some(Value::from("value1")))
            } else {
                Ok(None)
            }
        }

        fn scan_prefix(&self, _prefix: &str) -> KeyvolveResult<Vec<(String, Value)>> {
            Err(KeyvolveError::new(
                "Invalid operation",
                ErrorKind::InvalidOperation,
            ))
        }

        fn commit(&self, _txn: Transaction) -> KeyvolveResult<()> {
            Ok(())
        }

        fn clear(&self) -> KeyvolveResult<()> {
            Ok(())
        }

        fn size(&self) -> KeyvolveResult<u64> {
            Ok(1)
        }
    }

    #[test]
    fn test_get() {
        let store = Store::new(MockStore);
        assert_eq!(store.get("key1").unwrap(), Some(Value::from("value1")));
        assert_eq!(store.get("key2").unwrap(), None);
    }

    #[test]
    fn test_contains_key_default_impl() {
        let store = Store::new(MockStore);
        assert!(store.contains_key("key1").unwrap());
        assert!(!store.contains_key("key2").unwrap());
    }

    #[test]
    fn test_remove() {
        let store = Store::new(MockStore);
        assert_eq!(store.remove("key1").unwrap(), Some(Value::from("value1")));
        assert_eq!(store.remove("key2").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_error_propagates() {
        let store = Store::new(MockStore);
        assert!(store.scan_prefix("a").is_err());
    }

    #[test]
    fn test_clone_shares_provider() {
        let store1 = Store::new(MockStore);
        let store2 = store1.clone();
        assert_eq!(store1.size().unwrap(), store2.size().unwrap());
    }

    #[test]
    fn test_in_memory_constructor() {
        let store = Store::in_memory();
        assert_eq!(store.size().unwrap(), 0);
    }
}
