//! The migration engine: versioned, reversible schema transformations over
//! the store's records.
//!
//! [MigrationManager] orchestrates runs; [MigrationStorage] keeps the durable
//! version marker and applied-migration history; [SchemaUtils] provides the
//! batch record-mutation primitives migration bodies are written with; and
//! [MigrationRegistry] implementations supply the migration definitions,
//! either hand-written ([InMemoryRegistry]) or as declarative JSON files
//! ([DirectoryRegistry]).

mod instructions;
mod manager;
#[allow(clippy::module_inception)]
mod migration;
mod registry;
mod schema_utils;
mod storage;

pub use instructions::SchemaOp;
pub use manager::{ConflictPolicy, MigrationManager, UpOptions};
pub use migration::{
    AppliedMigration, ExecutionResult, IntegrityReport, Migration, MigrationFn, MigrationInfo,
    MigrationResult, MigrationStatus, StorageStats,
};
pub use registry::{DirectoryRegistry, InMemoryRegistry, MigrationRegistry};
pub use schema_utils::{BackupMetadata, SchemaUtils};
pub use storage::MigrationStorage;
