use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::migration::{Migration, SchemaOp};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of migration definitions.
///
/// The manager stays decoupled from where migrations come from: hand-written
/// code ([InMemoryRegistry]), declarative files on disk
/// ([DirectoryRegistry]), or any caller-provided implementation.
pub trait MigrationRegistry {
    /// Produces the full set of available migrations. Order is irrelevant;
    /// the manager sorts and validates the chain.
    fn load(&self) -> KeyvolveResult<Vec<Migration>>;
}

/// Registry over an explicit, caller-assembled list.
#[derive(Clone)]
pub struct InMemoryRegistry {
    migrations: Vec<Migration>,
}

impl InMemoryRegistry {
    pub fn new(migrations: Vec<Migration>) -> Self {
        InMemoryRegistry { migrations }
    }

    pub fn add(&mut self, migration: Migration) {
        self.migrations.push(migration);
    }
}

impl MigrationRegistry for InMemoryRegistry {
    fn load(&self) -> KeyvolveResult<Vec<Migration>> {
        Ok(self.migrations.clone())
    }
}

/// On-disk shape of one declarative migration file.
#[derive(Debug, Deserialize)]
struct MigrationFile {
    version: u32,
    description: String,
    up: Vec<SchemaOp>,
    down: Vec<SchemaOp>,
}

/// Registry that discovers declarative `*.json` migration files in a
/// directory.
///
/// # File format
/// ```json
/// {
///   "version": 1,
///   "description": "add status to users",
///   "up":   [ { "op": "add_field", "entity": "users", "field": "status", "value": "active" } ],
///   "down": [ { "op": "remove_field", "entity": "users", "field": "status" } ]
/// }
/// ```
///
/// # Characteristics
/// Files are visited in lexicographic name order. A file that cannot be read
/// or parsed is logged and skipped rather than failing the whole load, so one
/// malformed file does not block unrelated migrations (the chain validation
/// in the manager will still flag the resulting gap). Each loaded migration
/// carries a SHA-256 checksum of the file bytes, recorded on its
/// applied-migration record.
pub struct DirectoryRegistry {
    directory: PathBuf,
}

impl DirectoryRegistry {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        DirectoryRegistry {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    fn migration_files(&self) -> KeyvolveResult<Vec<PathBuf>> {
        if !self.directory.is_dir() {
            log::error!(
                "Migration directory {} does not exist",
                self.directory.display()
            );
            return Err(KeyvolveError::new(
                &format!(
                    "Migration directory {} does not exist",
                    self.directory.display()
                ),
                ErrorKind::NotFound,
            ));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load_file(path: &Path) -> KeyvolveResult<Migration> {
        let bytes = std::fs::read(path)?;
        let file: MigrationFile = serde_json::from_slice(&bytes)?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));

        let up_ops = Arc::new(file.up);
        let down_ops = Arc::new(file.down);
        Ok(Migration::new(
            file.version,
            &file.description,
            move |_store, utils| run_ops(&up_ops, utils),
            move |_store, utils| run_ops(&down_ops, utils),
        )
        .with_checksum(&checksum))
    }
}

fn run_ops(ops: &[SchemaOp], utils: &crate::migration::SchemaUtils) -> KeyvolveResult<()> {
    for op in ops {
        op.apply(utils)?;
    }
    Ok(())
}

impl MigrationRegistry for DirectoryRegistry {
    fn load(&self) -> KeyvolveResult<Vec<Migration>> {
        let mut migrations = Vec::new();
        for path in self.migration_files()? {
            match Self::load_file(&path) {
                Ok(migration) => migrations.push(migration),
                Err(e) => {
                    log::warn!("Skipping migration file {}: {}", path.display(), e);
                }
            }
        }
        log::debug!(
            "Loaded {} migrations from {}",
            migrations.len(),
            self.directory.display()
        );
        Ok(migrations)
    }
}
