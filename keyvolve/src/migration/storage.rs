use crate::common::{
    Value, APPLIED_SEGMENT, KEY_SEPARATOR, MIGRATION_PREFIX, VERSION_KEY_WIDTH, VERSION_MARKER_KEY,
};
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::migration::{AppliedMigration, IntegrityReport, StorageStats};
use crate::store::{Store, Transaction};
use itertools::Itertools;

/// Durable bookkeeping for one migration chain: the version marker and the
/// applied-migration records.
///
/// # Key layout
/// - `{prefix}:version` — the version marker (highest applied version, 0 if
///   none)
/// - `{prefix}:applied:{version}` — one record per applied migration, the
///   version zero-padded so the ordered scan yields ascending versions
///
/// The prefix is configurable so multiple independent chains can coexist in
/// one store.
///
/// # Invariant
/// The version marker and its matching applied record always transition
/// together in one atomic commit ([`apply_migration`](Self::apply_migration)
/// / [`rollback_migration`](Self::rollback_migration)), so readers never
/// observe a version without its history or vice versa.
#[derive(Clone)]
pub struct MigrationStorage {
    store: Store,
    prefix: String,
}

impl MigrationStorage {
    /// Creates storage under the default key prefix.
    pub fn new(store: Store) -> Self {
        MigrationStorage {
            store,
            prefix: MIGRATION_PREFIX.to_string(),
        }
    }

    /// Creates storage under a caller-chosen key prefix.
    pub fn with_prefix(store: Store, prefix: &str) -> KeyvolveResult<Self> {
        if prefix.is_empty() {
            log::error!("Migration storage prefix must not be empty");
            return Err(KeyvolveError::new(
                "Migration storage prefix must not be empty",
                ErrorKind::ValidationError,
            ));
        }
        Ok(MigrationStorage {
            store,
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn version_key(&self) -> String {
        format!("{}{}{}", self.prefix, KEY_SEPARATOR, VERSION_MARKER_KEY)
    }

    fn applied_prefix(&self) -> String {
        format!(
            "{}{}{}{}",
            self.prefix, KEY_SEPARATOR, APPLIED_SEGMENT, KEY_SEPARATOR
        )
    }

    fn applied_key(&self, version: u32) -> String {
        format!(
            "{}{:0width$}",
            self.applied_prefix(),
            version,
            width = VERSION_KEY_WIDTH
        )
    }

    /// Seeds the version marker to 0 if no marker exists yet.
    ///
    /// Idempotent; never regresses an existing version.
    pub fn initialize(&self) -> KeyvolveResult<()> {
        let mut txn = Transaction::new();
        txn.expect_value(&self.version_key(), None);
        txn.put(&self.version_key(), 0i64);

        match self.store.commit(txn) {
            Ok(()) => Ok(()),
            // Marker already present: another initialize got there first.
            Err(e) if e.kind() == &ErrorKind::TransactionConflict => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns the version marker, or 0 when none exists.
    pub fn current_version(&self) -> KeyvolveResult<u32> {
        match self.store.get(&self.version_key())? {
            None => Ok(0),
            Some(value) => {
                let version = value.as_i64().ok_or_else(|| {
                    KeyvolveError::new(
                        &format!(
                            "Version marker holds a {} value instead of an integer",
                            value.type_name()
                        ),
                        ErrorKind::InvalidDataType,
                    )
                })?;
                Ok(version.max(0) as u32)
            }
        }
    }

    pub fn set_current_version(&self, version: u32) -> KeyvolveResult<()> {
        self.store.put(&self.version_key(), Value::from(version))
    }

    pub fn record_applied_migration(&self, rec: &AppliedMigration) -> KeyvolveResult<()> {
        self.store
            .put(&self.applied_key(rec.version), Value::Record(rec.to_record()?))
    }

    pub fn is_migration_applied(&self, version: u32) -> KeyvolveResult<bool> {
        self.store.contains_key(&self.applied_key(version))
    }

    pub fn applied_migration(&self, version: u32) -> KeyvolveResult<Option<AppliedMigration>> {
        match self.store.get(&self.applied_key(version))? {
            None => Ok(None),
            Some(Value::Record(rec)) => Ok(Some(AppliedMigration::from_record(&rec)?)),
            Some(other) => Err(KeyvolveError::new(
                &format!(
                    "Applied migration key for version {} holds a {} value",
                    version,
                    other.type_name()
                ),
                ErrorKind::InvalidDataType,
            )),
        }
    }

    pub fn remove_applied_migration(&self, version: u32) -> KeyvolveResult<()> {
        self.store.remove(&self.applied_key(version))?;
        Ok(())
    }

    /// Returns all applied-migration records sorted ascending by version.
    pub fn applied_migrations(&self) -> KeyvolveResult<Vec<AppliedMigration>> {
        // Zero-padded keys make the prefix scan ascend by version.
        self.store
            .scan_prefix(&self.applied_prefix())?
            .iter()
            .map(|(key, value)| match value {
                Value::Record(rec) => AppliedMigration::from_record(rec),
                other => Err(KeyvolveError::new(
                    &format!("Applied migration key {} holds a {} value", key, other.type_name()),
                    ErrorKind::InvalidDataType,
                )),
            })
            .collect()
    }

    /// Advances the version marker from `from` to `to` and writes the applied
    /// record, as one atomic transaction.
    ///
    /// The marker is asserted to still be `from` at commit time; a concurrent
    /// mutation surfaces as
    /// [`ErrorKind::TransactionConflict`](crate::errors::ErrorKind::TransactionConflict)
    /// and nothing is applied.
    pub fn apply_migration(
        &self,
        from: u32,
        to: u32,
        rec: &AppliedMigration,
    ) -> KeyvolveResult<()> {
        let mut txn = Transaction::new();
        txn.expect_value(&self.version_key(), Some(Value::from(from)));
        txn.put(&self.version_key(), Value::from(to));
        txn.put(&self.applied_key(rec.version), Value::Record(rec.to_record()?));
        self.store.commit(txn)?;
        log::debug!(
            "Applied migration v{} ({} -> {}) under prefix {}",
            rec.version,
            from,
            to,
            self.prefix
        );
        Ok(())
    }

    /// Moves the version marker from `from` back to `to` and deletes the
    /// applied record for `version_to_remove`, as one atomic transaction.
    pub fn rollback_migration(
        &self,
        from: u32,
        to: u32,
        version_to_remove: u32,
    ) -> KeyvolveResult<()> {
        let mut txn = Transaction::new();
        txn.expect_value(&self.version_key(), Some(Value::from(from)));
        txn.put(&self.version_key(), Value::from(to));
        txn.delete(&self.applied_key(version_to_remove));
        self.store.commit(txn)?;
        log::debug!(
            "Rolled back migration v{} ({} -> {}) under prefix {}",
            version_to_remove,
            from,
            to,
            self.prefix
        );
        Ok(())
    }

    /// Audits the chain for anomalies between the version marker and the
    /// applied records.
    ///
    /// Three distinct anomaly classes are detected, and independent anomalies
    /// are all reported:
    /// 1. marker > 0 but no applied records exist
    /// 2. marker differs from the maximum applied version
    /// 3. a gap between two consecutive applied versions
    pub fn validate_integrity(&self) -> KeyvolveResult<IntegrityReport> {
        let version = self.current_version()?;
        let applied = self.applied_migrations()?;
        let mut errors = Vec::new();

        if version > 0 && applied.is_empty() {
            errors.push(format!(
                "Version mismatch: marker is {} but no applied migration records exist",
                version
            ));
        }

        if let Some(max) = applied.last().map(|a| a.version) {
            if version != max {
                errors.push(format!(
                    "Version mismatch: marker is {} but the maximum applied version is {}",
                    version, max
                ));
            }
        }

        for (prev, next) in applied.iter().tuple_windows() {
            if next.version != prev.version + 1 {
                errors.push(format!(
                    "Gap in applied migrations between version {} and version {}",
                    prev.version, next.version
                ));
            }
        }

        Ok(IntegrityReport {
            is_valid: errors.is_empty(),
            errors,
        })
    }

    pub fn stats(&self) -> KeyvolveResult<StorageStats> {
        let applied = self.applied_migrations()?;
        Ok(StorageStats {
            current_version: self.current_version()?,
            total_applied: applied.len() as u64,
            first_applied_at: applied.iter().map(|a| a.applied_at).min(),
            last_applied_at: applied.iter().map(|a| a.applied_at).max(),
        })
    }

    /// Erases the version marker and all applied records.
    ///
    /// Intended for test/reset flows only.
    pub fn clear(&self) -> KeyvolveResult<()> {
        let mut txn = Transaction::new();
        txn.delete(&self.version_key());
        for (key, _) in self.store.scan_prefix(&self.applied_prefix())? {
            txn.delete(&key);
        }
        self.store.commit(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::epoch_millis_or_zero;

    fn applied(version: u32) -> AppliedMigration {
        AppliedMigration {
            version,
            description: format!("migration {}", version),
            applied_at: epoch_millis_or_zero(),
            duration_ms: 1,
            checksum: None,
        }
    }

    fn setup() -> MigrationStorage {
        let storage = MigrationStorage::new(Store::in_memory());
        storage.initialize().unwrap();
        storage
    }

    // ==================== initialize() Tests ====================

    #[test]
    fn test_initialize_seeds_zero() {
        let storage = MigrationStorage::new(Store::in_memory());
        storage.initialize().unwrap();
        assert_eq!(storage.current_version().unwrap(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let storage = setup();
        storage.set_current_version(5).unwrap();
        storage.initialize().unwrap();
        // Never regresses an existing version
        assert_eq!(storage.current_version().unwrap(), 5);
    }

    #[test]
    fn test_current_version_defaults_to_zero_without_marker() {
        let storage = MigrationStorage::new(Store::in_memory());
        assert_eq!(storage.current_version().unwrap(), 0);
    }

    #[test]
    fn test_current_version_rejects_non_integer_marker() {
        let store = Store::in_memory();
        let storage = MigrationStorage::new(store.clone());
        store
            .put(
                &format!("{}:{}", MIGRATION_PREFIX, VERSION_MARKER_KEY),
                Value::from("garbage"),
            )
            .unwrap();
        let err = storage.current_version().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_with_prefix_rejects_empty() {
        let result = MigrationStorage::with_prefix(Store::in_memory(), "");
        assert!(result.is_err());
    }

    #[test]
    fn test_independent_chains_coexist() {
        let store = Store::in_memory();
        let chain_a = MigrationStorage::with_prefix(store.clone(), "$chain_a").unwrap();
        let chain_b = MigrationStorage::with_prefix(store.clone(), "$chain_b").unwrap();
        chain_a.initialize().unwrap();
        chain_b.initialize().unwrap();

        chain_a.apply_migration(0, 1, &applied(1)).unwrap();
        assert_eq!(chain_a.current_version().unwrap(), 1);
        assert_eq!(chain_b.current_version().unwrap(), 0);
        assert!(chain_b.applied_migrations().unwrap().is_empty());
    }

    // ==================== applied record Tests ====================

    #[test]
    fn test_record_and_fetch_applied_migration() {
        let storage = setup();
        let rec = applied(1);
        storage.record_applied_migration(&rec).unwrap();

        assert!(storage.is_migration_applied(1).unwrap());
        assert!(!storage.is_migration_applied(2).unwrap());
        assert_eq!(storage.applied_migration(1).unwrap(), Some(rec));
        assert_eq!(storage.applied_migration(2).unwrap(), None);
    }

    #[test]
    fn test_remove_applied_migration() {
        let storage = setup();
        storage.record_applied_migration(&applied(1)).unwrap();
        storage.remove_applied_migration(1).unwrap();
        assert!(!storage.is_migration_applied(1).unwrap());
        // Removing an absent record is a no-op
        storage.remove_applied_migration(1).unwrap();
    }

    #[test]
    fn test_applied_migrations_sorted_ascending() {
        let storage = setup();
        for version in [3u32, 1, 2] {
            storage.record_applied_migration(&applied(version)).unwrap();
        }
        let all = storage.applied_migrations().unwrap();
        let versions: Vec<u32> = all.iter().map(|a| a.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    // ==================== apply/rollback transaction Tests ====================

    #[test]
    fn test_apply_migration_commits_marker_and_record_together() {
        let storage = setup();
        storage.apply_migration(0, 1, &applied(1)).unwrap();
        assert_eq!(storage.current_version().unwrap(), 1);
        assert!(storage.is_migration_applied(1).unwrap());
    }

    #[test]
    fn test_apply_migration_conflict_leaves_state_untouched() {
        let storage = setup();
        storage.set_current_version(3).unwrap();

        let err = storage.apply_migration(0, 1, &applied(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionConflict);
        assert_eq!(storage.current_version().unwrap(), 3);
        assert!(!storage.is_migration_applied(1).unwrap());
    }

    #[test]
    fn test_rollback_migration_commits_marker_and_delete_together() {
        let storage = setup();
        storage.apply_migration(0, 1, &applied(1)).unwrap();
        storage.apply_migration(1, 2, &applied(2)).unwrap();

        storage.rollback_migration(2, 1, 2).unwrap();
        assert_eq!(storage.current_version().unwrap(), 1);
        assert!(!storage.is_migration_applied(2).unwrap());
        assert!(storage.is_migration_applied(1).unwrap());
    }

    #[test]
    fn test_rollback_migration_conflict() {
        let storage = setup();
        storage.apply_migration(0, 1, &applied(1)).unwrap();

        let err = storage.rollback_migration(5, 0, 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TransactionConflict);
        assert_eq!(storage.current_version().unwrap(), 1);
        assert!(storage.is_migration_applied(1).unwrap());
    }

    // ==================== validate_integrity() Tests ====================

    #[test]
    fn test_validate_integrity_clean_state() {
        let storage = setup();
        let report = storage.validate_integrity().unwrap();
        assert!(report.is_valid);
        assert!(report.errors.is_empty());

        storage.apply_migration(0, 1, &applied(1)).unwrap();
        storage.apply_migration(1, 2, &applied(2)).unwrap();
        assert!(storage.validate_integrity().unwrap().is_valid);
    }

    #[test]
    fn test_validate_integrity_marker_without_records() {
        let storage = setup();
        storage.set_current_version(4).unwrap();

        let report = storage.validate_integrity().unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("no applied migration records"));
    }

    #[test]
    fn test_validate_integrity_marker_mismatch() {
        let storage = setup();
        storage.record_applied_migration(&applied(1)).unwrap();
        storage.record_applied_migration(&applied(2)).unwrap();
        storage.set_current_version(5).unwrap();

        let report = storage.validate_integrity().unwrap();
        assert!(!report.is_valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("maximum applied version is 2")));
    }

    #[test]
    fn test_validate_integrity_gap_detected() {
        let storage = setup();
        for version in [1u32, 2, 4] {
            storage.record_applied_migration(&applied(version)).unwrap();
        }
        storage.set_current_version(4).unwrap();

        let report = storage.validate_integrity().unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("between version 2 and version 4"));
    }

    #[test]
    fn test_validate_integrity_reports_multiple_anomalies() {
        let storage = setup();
        for version in [1u32, 3] {
            storage.record_applied_migration(&applied(version)).unwrap();
        }
        storage.set_current_version(9).unwrap();

        let report = storage.validate_integrity().unwrap();
        assert!(!report.is_valid);
        // Marker mismatch and gap are independent anomalies
        assert_eq!(report.errors.len(), 2);
    }

    // ==================== stats() / clear() Tests ====================

    #[test]
    fn test_stats_empty() {
        let storage = setup();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.current_version, 0);
        assert_eq!(stats.total_applied, 0);
        assert_eq!(stats.first_applied_at, None);
        assert_eq!(stats.last_applied_at, None);
    }

    #[test]
    fn test_stats_after_applies() {
        let storage = setup();
        let mut first = applied(1);
        first.applied_at = 100;
        let mut second = applied(2);
        second.applied_at = 200;
        storage.apply_migration(0, 1, &first).unwrap();
        storage.apply_migration(1, 2, &second).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.current_version, 2);
        assert_eq!(stats.total_applied, 2);
        assert_eq!(stats.first_applied_at, Some(100));
        assert_eq!(stats.last_applied_at, Some(200));
    }

    #[test]
    fn test_clear_erases_marker_and_records() {
        let storage = setup();
        storage.apply_migration(0, 1, &applied(1)).unwrap();
        storage.clear().unwrap();

        assert_eq!(storage.current_version().unwrap(), 0);
        assert!(storage.applied_migrations().unwrap().is_empty());
    }
}
