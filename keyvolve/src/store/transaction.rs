use crate::common::Value;

/// A single write inside a [Transaction].
#[derive(Clone, Debug, PartialEq)]
pub enum TxnOp {
    /// Insert or update a key with a value.
    Put { key: String, value: Value },
    /// Delete a key. Deleting an absent key is a no-op.
    Delete { key: String },
}

impl TxnOp {
    pub fn key(&self) -> &str {
        match self {
            TxnOp::Put { key, .. } => key,
            TxnOp::Delete { key } => key,
        }
    }
}

/// An optimistic precondition checked at commit time.
///
/// `expected = None` asserts the key is absent; `expected = Some(v)` asserts
/// the key currently holds exactly `v`. A precondition that no longer holds
/// fails the whole transaction with
/// [`ErrorKind::TransactionConflict`](crate::errors::ErrorKind::TransactionConflict).
#[derive(Clone, Debug, PartialEq)]
pub struct Precondition {
    pub key: String,
    pub expected: Option<Value>,
}

/// An atomic multi-operation batch with optimistic version checks.
///
/// All operations are applied together or not at all. Preconditions are
/// evaluated against the live store under the provider's commit lock, so a
/// concurrent writer that invalidates one causes the commit to fail outright
/// rather than silently overwrite.
///
/// # Examples
///
/// ```rust,ignore
/// let mut txn = Transaction::new();
/// txn.expect_value("version", Some(Value::I64(2)));
/// txn.put("version", Value::I64(3));
/// store.commit(txn)?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    preconditions: Vec<Precondition>,
    ops: Vec<TxnOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            preconditions: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// Asserts that `key` holds exactly `expected` at commit time
    /// (`None` asserts absence).
    pub fn expect_value(&mut self, key: &str, expected: Option<Value>) -> &mut Self {
        self.preconditions.push(Precondition {
            key: key.to_string(),
            expected,
        });
        self
    }

    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> &mut Self {
        self.ops.push(TxnOp::Put {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: &str) -> &mut Self {
        self.ops.push(TxnOp::Delete {
            key: key.to_string(),
        });
        self
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn ops(&self) -> &[TxnOp] {
        &self.ops
    }

    /// Number of write operations in the batch.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Precondition>, Vec<TxnOp>) {
        (self.preconditions, self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_empty() {
        let txn = Transaction::new();
        assert!(txn.is_empty());
        assert_eq!(txn.len(), 0);
        assert!(txn.preconditions().is_empty());
    }

    #[test]
    fn test_put_and_delete_accumulate_in_order() {
        let mut txn = Transaction::new();
        txn.put("a", 1i64);
        txn.delete("b");
        txn.put("c", "x");
        assert_eq!(txn.len(), 3);
        assert_eq!(txn.ops()[0].key(), "a");
        assert_eq!(txn.ops()[1], TxnOp::Delete { key: "b".into() });
        assert_eq!(txn.ops()[2].key(), "c");
    }

    #[test]
    fn test_expect_value_records_precondition() {
        let mut txn = Transaction::new();
        txn.expect_value("version", Some(Value::I64(1)));
        txn.expect_value("absent", None);
        assert_eq!(txn.preconditions().len(), 2);
        assert_eq!(txn.preconditions()[0].expected, Some(Value::I64(1)));
        assert_eq!(txn.preconditions()[1].expected, None);
    }

    #[test]
    fn test_into_parts() {
        let mut txn = Transaction::new();
        txn.expect_value("k", None);
        txn.put("k", 1i64);
        let (pre, ops) = txn.into_parts();
        assert_eq!(pre.len(), 1);
        assert_eq!(ops.len(), 1);
    }
}
