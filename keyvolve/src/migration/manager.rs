use crate::common::epoch_millis_or_zero;
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::migration::{
    AppliedMigration, ExecutionResult, IntegrityReport, Migration, MigrationRegistry,
    MigrationResult, MigrationStatus, MigrationStorage, SchemaUtils, StorageStats,
};
use crate::store::Store;
use itertools::Itertools;
use std::time::Instant;

/// How the manager reacts when an optimistic version-marker commit is beaten
/// by a concurrent writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Surface the conflict as a failed migration (default).
    Fail,
    /// Re-read the marker and retry the commit up to `attempts` times, as
    /// long as the marker still holds the value the run started from.
    Retry { attempts: u32 },
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Fail
    }
}

/// Options for a forward migration run.
#[derive(Default)]
pub struct UpOptions {
    to_version: Option<u32>,
    dry_run: bool,
    continue_on_error: bool,
    on_before: Option<Box<dyn Fn(&Migration)>>,
    on_after: Option<Box<dyn Fn(&Migration, &ExecutionResult)>>,
}

impl UpOptions {
    pub fn new() -> Self {
        UpOptions::default()
    }

    /// Stops the run once this version has been applied. Defaults to the
    /// highest available version.
    pub fn to_version(mut self, version: u32) -> Self {
        self.to_version = Some(version);
        self
    }

    /// Reports which migrations would run without mutating the store.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Keeps executing later migrations after one fails.
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Invoked just before each migration's body runs.
    pub fn on_before<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Migration) + 'static,
    {
        self.on_before = Some(Box::new(callback));
        self
    }

    /// Invoked after each migration with its execution outcome.
    pub fn on_after<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Migration, &ExecutionResult) + 'static,
    {
        self.on_after = Some(Box::new(callback));
        self
    }
}

/// Orchestrates migration runs against one store.
///
/// # Purpose
/// Loads migration definitions from a registry, validates them as a
/// contiguous chain, and drives forward (`up`) and reverse (`down`) runs.
/// Each successful migration commits its version-marker transition and its
/// applied record atomically through [MigrationStorage].
///
/// # Characteristics
/// Constructed against an explicit [Store]; there is no process-wide
/// singleton, so independent managers (and independent chains, via distinct
/// key prefixes) can share one store.
pub struct MigrationManager {
    store: Store,
    storage: MigrationStorage,
    utils: SchemaUtils,
    conflict_policy: ConflictPolicy,
}

impl MigrationManager {
    /// Creates a manager with the default key prefix, batch size and
    /// [ConflictPolicy::Fail].
    pub fn new(store: Store) -> Self {
        MigrationManager {
            storage: MigrationStorage::new(store.clone()),
            utils: SchemaUtils::new(store.clone()),
            store,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    /// Creates a manager whose bookkeeping lives under a caller-chosen key
    /// prefix, so multiple independent chains can coexist in one store.
    pub fn with_prefix(store: Store, prefix: &str) -> KeyvolveResult<Self> {
        Ok(MigrationManager {
            storage: MigrationStorage::with_prefix(store.clone(), prefix)?,
            utils: SchemaUtils::new(store.clone()),
            store,
            conflict_policy: ConflictPolicy::default(),
        })
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> KeyvolveResult<Self> {
        self.utils = SchemaUtils::with_batch_size(self.store.clone(), batch_size)?;
        Ok(self)
    }

    /// The schema utilities bound to this manager's store.
    pub fn utils(&self) -> &SchemaUtils {
        &self.utils
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Loads the registry's migrations, sorted ascending and validated as a
    /// contiguous chain starting at version 1.
    pub fn load_migrations(
        &self,
        registry: &dyn MigrationRegistry,
    ) -> KeyvolveResult<Vec<Migration>> {
        let mut migrations = registry.load()?;
        migrations.sort_by_key(Migration::version);

        for migration in &migrations {
            if migration.version() == 0 {
                return Err(validation_error("Migration version 0 is not allowed"));
            }
            if migration.description().trim().is_empty() {
                return Err(validation_error(&format!(
                    "Migration v{} has an empty description",
                    migration.version()
                )));
            }
        }

        if let Some(first) = migrations.first() {
            if first.version() != 1 {
                return Err(validation_error(&format!(
                    "Migration chain must start at version 1, found {}",
                    first.version()
                )));
            }
        }

        for (prev, next) in migrations.iter().tuple_windows() {
            if next.version() == prev.version() {
                return Err(validation_error(&format!(
                    "Duplicate migration version {}",
                    next.version()
                )));
            }
            if next.version() != prev.version() + 1 {
                return Err(validation_error(&format!(
                    "Gap in migration chain between version {} and version {}",
                    prev.version(),
                    next.version()
                )));
            }
        }

        Ok(migrations)
    }

    /// Applies all pending migrations up to the target version, strictly
    /// ascending.
    ///
    /// Per-migration failures are captured in the returned
    /// [MigrationResult], not thrown; the run halts on the first failure
    /// unless `continue_on_error` is set. A dry run reports what would
    /// execute without touching the store.
    pub fn up(
        &self,
        registry: &dyn MigrationRegistry,
        options: UpOptions,
    ) -> KeyvolveResult<MigrationResult> {
        let migrations = self.load_migrations(registry)?;
        // A dry run must not touch the store, not even to seed the marker.
        if !options.dry_run {
            self.storage.initialize()?;
        }

        let previous_version = self.storage.current_version()?;
        let target = options
            .to_version
            .or_else(|| migrations.last().map(Migration::version))
            .unwrap_or(previous_version);

        let mut pending = Vec::new();
        for migration in &migrations {
            if migration.version() <= target
                && !self.storage.is_migration_applied(migration.version())?
            {
                pending.push(migration);
            }
        }

        log::info!(
            "Migrating up from version {} towards {} ({} pending{})",
            previous_version,
            target,
            pending.len(),
            if options.dry_run { ", dry run" } else { "" }
        );

        let mut result = MigrationResult {
            success: true,
            previous_version,
            current_version: previous_version,
            ..MigrationResult::default()
        };

        for migration in pending {
            if let Some(callback) = &options.on_before {
                callback(migration);
            }

            let execution = if options.dry_run {
                ExecutionResult {
                    version: migration.version(),
                    description: migration.description().to_string(),
                    success: true,
                    duration_ms: 0,
                    error: None,
                }
            } else {
                self.execute_up(migration)
            };

            if let Some(callback) = &options.on_after {
                callback(migration, &execution);
            }

            result.total_duration_ms += execution.duration_ms;
            if execution.success {
                result.executed.push(execution);
            } else {
                log::error!(
                    "Migration v{} failed: {}",
                    execution.version,
                    execution.error.as_deref().unwrap_or("unknown error")
                );
                result.success = false;
                if let Some(error) = &execution.error {
                    result.errors.push(error.clone());
                }
                result.failed.push(execution);
                if !options.continue_on_error {
                    break;
                }
            }
        }

        result.current_version = self.storage.current_version()?;
        Ok(result)
    }

    fn execute_up(&self, migration: &Migration) -> ExecutionResult {
        let started = Instant::now();
        // The expected source version is fixed before the body runs; a
        // writer that moves the marker while the body executes must fail
        // the commit, not be overwritten.
        let outcome = self.storage.current_version().and_then(|from| {
            migration.run_up(&self.store, &self.utils).and_then(|()| {
                let duration_ms = started.elapsed().as_millis() as u64;
                let rec = AppliedMigration {
                    version: migration.version(),
                    description: migration.description().to_string(),
                    applied_at: epoch_millis_or_zero(),
                    duration_ms,
                    checksum: migration.checksum().map(str::to_string),
                };
                self.commit_transition(from, migration.version(), |from| {
                    self.storage.apply_migration(from, rec.version, &rec)
                })
            })
        });

        ExecutionResult {
            version: migration.version(),
            description: migration.description().to_string(),
            success: outcome.is_ok(),
            duration_ms: started.elapsed().as_millis() as u64,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Commits a paired marker/record transition from `from`, honoring the
    /// conflict policy: a retry re-reads the marker and tries again only
    /// while it still holds `from`. A marker that genuinely moved fails the
    /// commit outright.
    fn commit_transition<F>(&self, from: u32, version: u32, commit: F) -> KeyvolveResult<()>
    where
        F: Fn(u32) -> KeyvolveResult<()>,
    {
        let mut attempts_left = match self.conflict_policy {
            ConflictPolicy::Fail => 0,
            ConflictPolicy::Retry { attempts } => attempts,
        };

        loop {
            match commit(from) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == &ErrorKind::TransactionConflict && attempts_left > 0 => {
                    attempts_left -= 1;
                    if self.storage.current_version()? != from {
                        // The marker moved: a concurrent run won. Retrying
                        // from a different base would skip its history.
                        return Err(e);
                    }
                    log::warn!(
                        "Commit conflict on v{}, retrying ({} attempts left)",
                        version,
                        attempts_left
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rolls back applied migrations above `to_version`, strictly descending,
    /// stopping on the first failure.
    ///
    /// Down runs take the definitions directly rather than a registry: a
    /// rollback must use the exact bodies that were applied.
    pub fn down(&self, to_version: u32, migrations: &[Migration]) -> KeyvolveResult<MigrationResult> {
        self.storage.initialize()?;
        let previous_version = self.storage.current_version()?;

        if to_version >= previous_version {
            log::error!(
                "Rollback target {} is not below current version {}",
                to_version,
                previous_version
            );
            return Err(KeyvolveError::new(
                &format!(
                    "Rollback target {} is not below current version {}",
                    to_version, previous_version
                ),
                ErrorKind::StateError,
            ));
        }

        let applied = self.storage.applied_migrations()?;
        let to_revert: Vec<&AppliedMigration> = applied
            .iter()
            .rev()
            .filter(|a| a.version > to_version)
            .collect();

        // Every version being reverted needs its definition up front; failing
        // halfway through for a missing body would strand the chain.
        let mut resolved = Vec::with_capacity(to_revert.len());
        for record in &to_revert {
            let migration = migrations
                .iter()
                .find(|m| m.version() == record.version)
                .ok_or_else(|| {
                    KeyvolveError::new(
                        &format!(
                            "No migration definition for applied version {}",
                            record.version
                        ),
                        ErrorKind::StateError,
                    )
                })?;
            resolved.push(migration);
        }

        log::info!(
            "Migrating down from version {} to {} ({} to revert)",
            previous_version,
            to_version,
            resolved.len()
        );

        let mut result = MigrationResult {
            success: true,
            previous_version,
            current_version: previous_version,
            ..MigrationResult::default()
        };
        let mut remaining: Vec<u32> = applied.iter().map(|a| a.version).collect();

        for migration in resolved {
            let started = Instant::now();
            // Fix the expected marker value before the body runs, as in up().
            let outcome = self.storage.current_version().and_then(|from| {
                migration.run_down(&self.store, &self.utils).and_then(|()| {
                    remaining.pop();
                    // Marker falls back to the next surviving applied version.
                    let new_marker = remaining.last().copied().unwrap_or(to_version);
                    self.commit_transition(from, migration.version(), |from| {
                        self.storage
                            .rollback_migration(from, new_marker, migration.version())
                    })
                })
            });

            let execution = ExecutionResult {
                version: migration.version(),
                description: migration.description().to_string(),
                success: outcome.is_ok(),
                duration_ms: started.elapsed().as_millis() as u64,
                error: outcome.err().map(|e| e.to_string()),
            };

            result.total_duration_ms += execution.duration_ms;
            if execution.success {
                result.executed.push(execution);
            } else {
                log::error!(
                    "Rollback of v{} failed: {}",
                    execution.version,
                    execution.error.as_deref().unwrap_or("unknown error")
                );
                result.success = false;
                if let Some(error) = &execution.error {
                    result.errors.push(error.clone());
                }
                result.failed.push(execution);
                break;
            }
        }

        result.current_version = self.storage.current_version()?;
        Ok(result)
    }

    /// Snapshot of the chain state relative to the registry's available set.
    pub fn status(&self, registry: &dyn MigrationRegistry) -> KeyvolveResult<MigrationStatus> {
        let migrations = self.load_migrations(registry)?;
        let current_version = self.storage.current_version()?;
        let applied = self.storage.applied_migrations()?;

        let mut pending = Vec::new();
        for migration in &migrations {
            if !applied.iter().any(|a| a.version == migration.version()) {
                pending.push(migration.info());
            }
        }

        // Up to date means nothing pending AND the marker sits at the
        // highest available version; a diverged marker is not up to date
        // even with an empty pending set.
        let is_up_to_date = match migrations.last().map(Migration::version) {
            None => true,
            Some(max) => pending.is_empty() && current_version == max,
        };

        Ok(MigrationStatus {
            current_version,
            available: migrations.iter().map(Migration::info).collect(),
            applied,
            is_up_to_date,
            pending,
        })
    }

    pub fn validate_integrity(&self) -> KeyvolveResult<IntegrityReport> {
        self.storage.validate_integrity()
    }

    pub fn stats(&self) -> KeyvolveResult<StorageStats> {
        self.storage.stats()
    }

    /// Wipes the chain's bookkeeping and re-seeds the marker to 0. The
    /// entity records themselves are untouched. Destructive; intended for
    /// tests and administrative resets.
    pub fn reset(&self) -> KeyvolveResult<()> {
        self.storage.clear()?;
        self.storage.initialize()
    }
}

fn validation_error(message: &str) -> KeyvolveError {
    log::error!("{}", message);
    KeyvolveError::new(message, ErrorKind::ValidationError)
}
