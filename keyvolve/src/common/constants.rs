// key layout constants
pub const KEY_SEPARATOR: &str = ":";

// migration state constants
pub const MIGRATION_PREFIX: &str = "$keyvolve_migrations";
pub const VERSION_MARKER_KEY: &str = "version";
pub const APPLIED_SEGMENT: &str = "applied";
/// Applied-record keys embed the version zero-padded to this width so the
/// ordered scan yields ascending version order.
pub const VERSION_KEY_WIDTH: usize = 10;

// schema utility constants
pub const BACKUP_PREFIX: &str = "$keyvolve_backup";
pub const BACKUP_META_PREFIX: &str = "$keyvolve_backup_meta";
pub const INDEX_PREFIX: &str = "$keyvolve_index";
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Namespaces that entity names must not collide with.
pub const RESERVED_PREFIXES: [&str; 4] = [
    MIGRATION_PREFIX,
    BACKUP_PREFIX,
    BACKUP_META_PREFIX,
    INDEX_PREFIX,
];

// Compile-time assertion for reserved prefix count
const _: () = {
    const RESERVED_PREFIX_COUNT: usize = 4;
    const ACTUAL_COUNT: usize = RESERVED_PREFIXES.len();
    const _: [(); 1] = [(); (ACTUAL_COUNT == RESERVED_PREFIX_COUNT) as usize];
};

// applied migration record fields
pub const FIELD_VERSION: &str = "version";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_APPLIED_AT: &str = "applied_at";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_CHECKSUM: &str = "checksum";

// backup metadata record fields
pub const FIELD_ORIGINAL_ENTITY: &str = "original_entity";
pub const FIELD_BACKUP_NAME: &str = "backup_name";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_RECORD_COUNT: &str = "record_count";
