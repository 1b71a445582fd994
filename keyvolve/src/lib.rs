//! # Keyvolve - Schema Migration Engine
//!
//! Keyvolve is a schema migration engine for entity records stored in an
//! ordered key-value store. It manages versioned, reversible migrations with
//! durable bookkeeping, batch record transformation utilities, and pluggable
//! migration sources.
//!
//! ## Key Features
//!
//! - **Versioned chain**: migrations form a contiguous chain starting at
//!   version 1, validated before every run
//! - **Atomic bookkeeping**: each applied migration commits its version
//!   marker and history record in one transaction; readers never observe a
//!   half-applied transition
//! - **Reversible**: every migration pairs an `up` body with a `down` body,
//!   and rollback walks applied versions strictly descending
//! - **Batch utilities**: field add/remove/rename/transform, entity
//!   copy/rename/truncate, backup snapshots and derived lookup indexes, all
//!   paged through bounded transactions
//! - **Pluggable sources**: hand-written migrations, or declarative JSON
//!   files discovered from a directory
//! - **Embedded**: runs in-process against any [`store::StoreProvider`]
//!   backend; an in-memory implementation ships with the crate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keyvolve::common::Value;
//! use keyvolve::migration::{InMemoryRegistry, Migration, MigrationManager, UpOptions};
//! use keyvolve::store::Store;
//!
//! # fn main() -> keyvolve::errors::KeyvolveResult<()> {
//! let store = Store::in_memory();
//! let manager = MigrationManager::new(store);
//!
//! let registry = InMemoryRegistry::new(vec![Migration::new(
//!     1,
//!     "add status to users",
//!     |_store, utils| utils.add_field("users", "status", Value::from("active")).map(|_| ()),
//!     |_store, utils| utils.remove_field("users", "status").map(|_| ()),
//! )]);
//!
//! let result = manager.up(&registry, UpOptions::new())?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Shared values, records, constants, and utilities
//! - [`errors`] - Error types and result definitions
//! - [`migration`] - The migration engine: manager, storage, utilities,
//!   registries
//! - [`store`] - Storage substrate abstractions and the in-memory backend

pub mod common;
pub mod errors;
pub mod migration;
pub mod store;

pub use errors::{ErrorKind, KeyvolveError, KeyvolveResult};
