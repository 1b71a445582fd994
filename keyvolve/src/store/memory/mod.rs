//! In-memory reference implementation of the store substrate.

mod store;

pub use store::MemoryStore;
