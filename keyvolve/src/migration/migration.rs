use crate::common::{
    Record, FIELD_APPLIED_AT, FIELD_CHECKSUM, FIELD_DESCRIPTION, FIELD_DURATION_MS, FIELD_VERSION,
};
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::migration::SchemaUtils;
use crate::store::Store;
use chrono::DateTime;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Body of a migration direction: receives the raw store handle and the
/// schema utilities bound to it. A body may use either freely.
pub type MigrationFn = Arc<dyn Fn(&Store, &SchemaUtils) -> KeyvolveResult<()> + Send + Sync>;

/// A versioned, named pair of forward (`up`) and reverse (`down`) procedures
/// that transform stored records from one schema shape to another.
///
/// # Authoring contract
/// Every `down` must exactly undo its `up`. The engine cannot verify this
/// structurally; test it with fixture round-trips. Bodies must also be safely
/// re-runnable, because a failure partway through a multi-page mutation
/// leaves earlier pages committed (see
/// [`SchemaUtils::batch_process`](crate::migration::SchemaUtils::batch_process)).
///
/// # Examples
///
/// ```rust,ignore
/// let migration = Migration::new(
///     1,
///     "add status to users",
///     |_store, utils| utils.add_field("users", "status", Value::from("active")),
///     |_store, utils| utils.remove_field("users", "status").map(|_| ()),
/// );
/// ```
#[derive(Clone)]
pub struct Migration {
    version: u32,
    description: String,
    up: MigrationFn,
    down: MigrationFn,
    checksum: Option<String>,
}

impl Migration {
    pub fn new<U, D>(version: u32, description: &str, up: U, down: D) -> Self
    where
        U: Fn(&Store, &SchemaUtils) -> KeyvolveResult<()> + Send + Sync + 'static,
        D: Fn(&Store, &SchemaUtils) -> KeyvolveResult<()> + Send + Sync + 'static,
    {
        Migration {
            version,
            description: description.to_string(),
            up: Arc::new(up),
            down: Arc::new(down),
            checksum: None,
        }
    }

    /// Attaches a content checksum, recorded on the applied-migration record.
    pub fn with_checksum(mut self, checksum: &str) -> Self {
        self.checksum = Some(checksum.to_string());
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn info(&self) -> MigrationInfo {
        MigrationInfo {
            version: self.version,
            description: self.description.clone(),
        }
    }

    /// Executes the forward body.
    pub fn run_up(&self, store: &Store, utils: &SchemaUtils) -> KeyvolveResult<()> {
        (self.up)(store, utils)
    }

    /// Executes the reverse body.
    pub fn run_down(&self, store: &Store, utils: &SchemaUtils) -> KeyvolveResult<()> {
        (self.down)(store, utils)
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("checksum", &self.checksum)
            .field("up", &"<fn>")
            .field("down", &"<fn>")
            .finish()
    }
}

/// Version and description of a migration, without its bodies.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MigrationInfo {
    pub version: u32,
    pub description: String,
}

/// Durable proof that a specific migration version has run.
///
/// Created exactly once per successfully applied `up`, removed exactly once
/// per successful `down` that reverts it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub description: String,
    /// Epoch milliseconds at which the migration finished applying.
    pub applied_at: i64,
    pub duration_ms: u64,
    pub checksum: Option<String>,
}

impl AppliedMigration {
    /// Converts into the persisted record shape.
    pub fn to_record(&self) -> KeyvolveResult<Record> {
        let mut rec = Record::new();
        rec.put(FIELD_VERSION, self.version)?;
        rec.put(FIELD_DESCRIPTION, self.description.as_str())?;
        rec.put(FIELD_APPLIED_AT, self.applied_at)?;
        rec.put(FIELD_DURATION_MS, self.duration_ms)?;
        if let Some(checksum) = &self.checksum {
            rec.put(FIELD_CHECKSUM, checksum.as_str())?;
        }
        Ok(rec)
    }

    /// Reconstructs from the persisted record shape.
    pub fn from_record(rec: &Record) -> KeyvolveResult<Self> {
        let version = rec.get(FIELD_VERSION).as_i64().ok_or_else(|| {
            KeyvolveError::new(
                "Applied migration record has no version field",
                ErrorKind::InvalidDataType,
            )
        })?;
        let description = rec.get(FIELD_DESCRIPTION).as_str().ok_or_else(|| {
            KeyvolveError::new(
                "Applied migration record has no description field",
                ErrorKind::InvalidDataType,
            )
        })?;
        let applied_at = rec.get(FIELD_APPLIED_AT).as_i64().unwrap_or(0);
        let duration_ms = rec.get(FIELD_DURATION_MS).as_i64().unwrap_or(0).max(0) as u64;
        let checksum = rec.get(FIELD_CHECKSUM).as_str().map(str::to_string);

        Ok(AppliedMigration {
            version: version as u32,
            description: description.to_string(),
            applied_at,
            duration_ms,
            checksum,
        })
    }
}

impl Display for AppliedMigration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let when = DateTime::from_timestamp_millis(self.applied_at)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.applied_at.to_string());
        write!(
            f,
            "v{} {} (applied {}, {} ms)",
            self.version, self.description, when, self.duration_ms
        )
    }
}

/// Outcome of one migration body execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionResult {
    pub version: u32,
    pub description: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Aggregate outcome of one `up()` or `down()` invocation.
///
/// A run that executed nothing (nothing pending) is successful. Callers must
/// check `success`/`errors`: per-migration failures are captured here, not
/// thrown, so a non-throwing but unsuccessful run must not be mistaken for
/// silent success.
#[derive(Clone, Debug, Default)]
pub struct MigrationResult {
    pub success: bool,
    pub previous_version: u32,
    pub current_version: u32,
    pub executed: Vec<ExecutionResult>,
    pub failed: Vec<ExecutionResult>,
    pub total_duration_ms: u64,
    pub errors: Vec<String>,
}

/// Snapshot of the migration state relative to an available set.
#[derive(Clone, Debug)]
pub struct MigrationStatus {
    pub current_version: u32,
    pub available: Vec<MigrationInfo>,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<MigrationInfo>,
    pub is_up_to_date: bool,
}

/// Result of a chain-integrity audit.
#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Summary statistics over the migration storage.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageStats {
    pub current_version: u32,
    pub total_applied: u64,
    pub first_applied_at: Option<i64>,
    pub last_applied_at: Option<i64>,
}

impl Display for StorageStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let fmt_ts = |ts: Option<i64>| {
            ts.and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "version {} ({} applied, first {}, last {})",
            self.current_version,
            self.total_applied,
            fmt_ts(self.first_applied_at),
            fmt_ts(self.last_applied_at)
        )
    }
}
