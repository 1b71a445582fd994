//! Ordered key-value store substrate.
//!
//! The migration engine treats the store as a given collaborator: point
//! reads/writes, ascending prefix scans, and an atomic multi-operation
//! [Transaction] with optimistic preconditions. Backends implement
//! [StoreProvider]; the engine only ever holds the cheap-clone [Store]
//! facade.

mod kv_store;
pub mod memory;
mod transaction;

pub use kv_store::{Store, StoreProvider};
pub use transaction::{Precondition, Transaction, TxnOp};
