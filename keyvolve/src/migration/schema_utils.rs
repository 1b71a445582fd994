use crate::common::{
    epoch_millis_or_zero, Record, Value, BACKUP_META_PREFIX, BACKUP_PREFIX, DEFAULT_BATCH_SIZE,
    FIELD_BACKUP_NAME, FIELD_CREATED_AT, FIELD_ORIGINAL_ENTITY, FIELD_RECORD_COUNT, INDEX_PREFIX,
    KEY_SEPARATOR,
};
use crate::errors::{ErrorKind, KeyvolveError, KeyvolveResult};
use crate::store::{Store, Transaction};

/// Metadata describing a backup snapshot of an entity's records.
///
/// Backups live outside the migration version chain; their lifecycle is
/// caller-managed (create, restore, list, delete).
#[derive(Clone, Debug, PartialEq)]
pub struct BackupMetadata {
    pub original_entity: String,
    pub backup_name: String,
    /// Epoch milliseconds at which the snapshot was taken.
    pub created_at: i64,
    pub record_count: u64,
}

impl BackupMetadata {
    pub fn to_record(&self) -> KeyvolveResult<Record> {
        let mut rec = Record::new();
        rec.put(FIELD_ORIGINAL_ENTITY, self.original_entity.as_str())?;
        rec.put(FIELD_BACKUP_NAME, self.backup_name.as_str())?;
        rec.put(FIELD_CREATED_AT, self.created_at)?;
        rec.put(FIELD_RECORD_COUNT, self.record_count)?;
        Ok(rec)
    }

    pub fn from_record(rec: &Record) -> KeyvolveResult<Self> {
        let original_entity = rec.get(FIELD_ORIGINAL_ENTITY).as_str().ok_or_else(|| {
            KeyvolveError::new(
                "Backup metadata record has no original entity field",
                ErrorKind::InvalidDataType,
            )
        })?;
        let backup_name = rec.get(FIELD_BACKUP_NAME).as_str().ok_or_else(|| {
            KeyvolveError::new(
                "Backup metadata record has no backup name field",
                ErrorKind::InvalidDataType,
            )
        })?;
        Ok(BackupMetadata {
            original_entity: original_entity.to_string(),
            backup_name: backup_name.to_string(),
            created_at: rec.get(FIELD_CREATED_AT).as_i64().unwrap_or(0),
            record_count: rec.get(FIELD_RECORD_COUNT).as_i64().unwrap_or(0).max(0) as u64,
        })
    }
}

/// Record-level mutation primitives used by migration bodies.
///
/// # Purpose
/// Generic batch operations over all records of an entity: field mutations,
/// entity-wide copies, backup snapshots and derived lookup indexes. Every
/// mutating operation pages through [`batch_process`](Self::batch_process),
/// committing one bounded atomic transaction per page.
///
/// # Idempotence
/// Field operations no-op for records already matching the target shape
/// (adding skips present fields, renaming skips absent sources), so a
/// half-applied migration converges when re-run.
#[derive(Clone)]
pub struct SchemaUtils {
    store: Store,
    batch_size: usize,
}

impl SchemaUtils {
    /// Creates utilities with the default page size.
    pub fn new(store: Store) -> Self {
        SchemaUtils {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Creates utilities with a caller-chosen page size.
    pub fn with_batch_size(store: Store, batch_size: usize) -> KeyvolveResult<Self> {
        if batch_size == 0 {
            log::error!("Batch size must be positive");
            return Err(KeyvolveError::new(
                "Batch size must be positive",
                ErrorKind::ValidationError,
            ));
        }
        Ok(SchemaUtils { store, batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn entity_prefix(entity: &str) -> String {
        format!("{}{}", entity, KEY_SEPARATOR)
    }

    fn backup_data_prefix(backup_name: &str) -> String {
        format!("{}{}{}{}", BACKUP_PREFIX, KEY_SEPARATOR, backup_name, KEY_SEPARATOR)
    }

    fn backup_meta_key(backup_name: &str) -> String {
        format!("{}{}{}", BACKUP_META_PREFIX, KEY_SEPARATOR, backup_name)
    }

    fn index_prefix(entity: &str, field: &str) -> String {
        format!(
            "{}{}{}{}{}{}",
            INDEX_PREFIX, KEY_SEPARATOR, entity, KEY_SEPARATOR, field, KEY_SEPARATOR
        )
    }

    fn validate_name(name: &str, what: &str) -> KeyvolveResult<()> {
        if name.is_empty() {
            log::error!("{} name must not be empty", what);
            return Err(KeyvolveError::new(
                &format!("{} name must not be empty", what),
                ErrorKind::ValidationError,
            ));
        }
        if name.starts_with('$') {
            log::error!("{} name {} collides with a reserved namespace", what, name);
            return Err(KeyvolveError::new(
                &format!("{} name {} collides with a reserved namespace", what, name),
                ErrorKind::ValidationError,
            ));
        }
        if name.contains(KEY_SEPARATOR) {
            log::error!("{} name {} must not contain {:?}", what, name, KEY_SEPARATOR);
            return Err(KeyvolveError::new(
                &format!("{} name {} must not contain {:?}", what, name, KEY_SEPARATOR),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }

    fn decode_record(key: &str, value: &Value) -> KeyvolveResult<Record> {
        match value {
            Value::Record(rec) => Ok(rec.clone()),
            other => Err(KeyvolveError::new(
                &format!("Key {} holds a {} value instead of a record", key, other.type_name()),
                ErrorKind::InvalidDataType,
            )),
        }
    }

    /// Pagination primitive every other utility composes from.
    ///
    /// Accumulates the entity's records into pages of `batch_size` and
    /// invokes `processor` once per full page plus a final partial page
    /// (ceil(N/P) invocations). Mutations the processor stages into the page
    /// transaction are committed as one atomic unit before the next page.
    ///
    /// There is no cross-page atomicity: if a page commit fails, earlier
    /// pages stay committed. Migration bodies must therefore be safely
    /// re-runnable.
    ///
    /// Returns the number of records processed.
    pub fn batch_process<F>(&self, entity: &str, processor: F) -> KeyvolveResult<u64>
    where
        F: FnMut(&[(String, Record)], &mut Transaction) -> KeyvolveResult<()>,
    {
        self.batch_process_with(entity, self.batch_size, processor)
    }

    /// [`batch_process`](Self::batch_process) with an explicit page size.
    pub fn batch_process_with<F>(
        &self,
        entity: &str,
        batch_size: usize,
        mut processor: F,
    ) -> KeyvolveResult<u64>
    where
        F: FnMut(&[(String, Record)], &mut Transaction) -> KeyvolveResult<()>,
    {
        Self::validate_name(entity, "Entity")?;
        if batch_size == 0 {
            return Err(KeyvolveError::new(
                "Batch size must be positive",
                ErrorKind::ValidationError,
            ));
        }

        let entries = self.store.scan_prefix(&Self::entity_prefix(entity))?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            records.push((key.clone(), Self::decode_record(key, value)?));
        }

        let processed = records.len() as u64;
        for page in records.chunks(batch_size) {
            let mut txn = Transaction::new();
            processor(page, &mut txn)?;
            if !txn.is_empty() {
                self.store.commit(txn)?;
            }
        }
        Ok(processed)
    }

    /// Adds `field` with a fixed default to every record that does not
    /// already carry it. Returns the number of records changed.
    pub fn add_field(&self, entity: &str, field: &str, default: Value) -> KeyvolveResult<u64> {
        self.add_field_with(entity, field, move |_rec| Ok(default.clone()))
    }

    /// Adds `field` to every record that does not already carry it, computing
    /// the value per record.
    pub fn add_field_with<G>(&self, entity: &str, field: &str, generator: G) -> KeyvolveResult<u64>
    where
        G: Fn(&Record) -> KeyvolveResult<Value>,
    {
        Self::validate_field(field)?;
        let mut changed = 0u64;
        self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                if rec.contains_field(field) {
                    continue;
                }
                let mut updated = rec.clone();
                updated.put(field, generator(rec)?)?;
                txn.put(key, Value::Record(updated));
                changed += 1;
            }
            Ok(())
        })?;
        log::debug!("Added field {} to {} records of entity {}", field, changed, entity);
        Ok(changed)
    }

    /// Removes `field` from every record carrying it. Returns the number of
    /// records changed.
    pub fn remove_field(&self, entity: &str, field: &str) -> KeyvolveResult<u64> {
        Self::validate_field(field)?;
        let mut changed = 0u64;
        self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                if !rec.contains_field(field) {
                    continue;
                }
                let mut updated = rec.clone();
                updated.remove(field);
                txn.put(key, Value::Record(updated));
                changed += 1;
            }
            Ok(())
        })?;
        log::debug!(
            "Removed field {} from {} records of entity {}",
            field,
            changed,
            entity
        );
        Ok(changed)
    }

    /// Renames `from` to `to` in every record carrying `from`. Records
    /// without `from` (including already-renamed ones) are left alone.
    pub fn rename_field(&self, entity: &str, from: &str, to: &str) -> KeyvolveResult<u64> {
        Self::validate_field(from)?;
        Self::validate_field(to)?;
        if from == to {
            return Err(KeyvolveError::new(
                "Field rename source and target are identical",
                ErrorKind::ValidationError,
            ));
        }
        let mut changed = 0u64;
        self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                if !rec.contains_field(from) {
                    continue;
                }
                let mut updated = rec.clone();
                if let Some(value) = updated.remove(from) {
                    updated.put(to, value)?;
                }
                txn.put(key, Value::Record(updated));
                changed += 1;
            }
            Ok(())
        })?;
        log::debug!(
            "Renamed field {} to {} in {} records of entity {}",
            from,
            to,
            changed,
            entity
        );
        Ok(changed)
    }

    /// Applies `transform` to the current value of `field` in every record
    /// carrying it. Records where the transform returns the unchanged value
    /// are not rewritten.
    pub fn transform_field<G>(&self, entity: &str, field: &str, transform: G) -> KeyvolveResult<u64>
    where
        G: Fn(&Value) -> KeyvolveResult<Value>,
    {
        Self::validate_field(field)?;
        let mut changed = 0u64;
        self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                if !rec.contains_field(field) {
                    continue;
                }
                let current = rec.get(field);
                let transformed = transform(current)?;
                if &transformed == current {
                    continue;
                }
                let mut updated = rec.clone();
                updated.put(field, transformed)?;
                txn.put(key, Value::Record(updated));
                changed += 1;
            }
            Ok(())
        })?;
        log::debug!(
            "Transformed field {} in {} records of entity {}",
            field,
            changed,
            entity
        );
        Ok(changed)
    }

    /// Duplicates every record of `from` under the `to` prefix. Returns the
    /// number of records copied.
    pub fn copy_entity(&self, from: &str, to: &str) -> KeyvolveResult<u64> {
        Self::validate_name(to, "Entity")?;
        if from == to {
            return Err(KeyvolveError::new(
                "Entity copy source and target are identical",
                ErrorKind::ValidationError,
            ));
        }
        let from_prefix = Self::entity_prefix(from);
        let to_prefix = Self::entity_prefix(to);
        self.batch_process(from, |page, txn| {
            for (key, rec) in page {
                let id = &key[from_prefix.len()..];
                txn.put(&format!("{}{}", to_prefix, id), Value::Record(rec.clone()));
            }
            Ok(())
        })
    }

    /// Renames an entity: copies all records to the new prefix, then deletes
    /// the originals.
    pub fn rename_entity(&self, from: &str, to: &str) -> KeyvolveResult<u64> {
        let copied = self.copy_entity(from, to)?;
        self.truncate_entity(from)?;
        Ok(copied)
    }

    /// Deletes every record of an entity. Returns the number deleted.
    pub fn truncate_entity(&self, entity: &str) -> KeyvolveResult<u64> {
        self.batch_process(entity, |page, txn| {
            for (key, _) in page {
                txn.delete(key);
            }
            Ok(())
        })
    }

    pub fn count_records(&self, entity: &str) -> KeyvolveResult<u64> {
        Self::validate_name(entity, "Entity")?;
        Ok(self.store.scan_prefix(&Self::entity_prefix(entity))?.len() as u64)
    }

    /// Checks whether any record of the entity carries `field`.
    pub fn field_exists(&self, entity: &str, field: &str) -> KeyvolveResult<bool> {
        Self::validate_name(entity, "Entity")?;
        Self::validate_field(field)?;
        for (key, value) in self.store.scan_prefix(&Self::entity_prefix(entity))? {
            if Self::decode_record(&key, &value)?.contains_field(field) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Snapshots the entity's full record set under a namespaced shadow copy.
    ///
    /// Fails if a backup with the same name already exists; backups are
    /// explicit safety artifacts and are never silently replaced.
    pub fn backup_entity(&self, entity: &str, backup_name: &str) -> KeyvolveResult<BackupMetadata> {
        Self::validate_name(backup_name, "Backup")?;
        let meta_key = Self::backup_meta_key(backup_name);
        if self.store.contains_key(&meta_key)? {
            log::error!("Backup {} already exists", backup_name);
            return Err(KeyvolveError::new(
                &format!("Backup {} already exists", backup_name),
                ErrorKind::InvalidOperation,
            ));
        }

        let entity_prefix = Self::entity_prefix(entity);
        let data_prefix = Self::backup_data_prefix(backup_name);
        let record_count = self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                let id = &key[entity_prefix.len()..];
                txn.put(&format!("{}{}", data_prefix, id), Value::Record(rec.clone()));
            }
            Ok(())
        })?;

        let meta = BackupMetadata {
            original_entity: entity.to_string(),
            backup_name: backup_name.to_string(),
            created_at: epoch_millis_or_zero(),
            record_count,
        };
        self.store
            .put(&meta_key, Value::Record(meta.to_record()?))?;
        log::debug!(
            "Backed up {} records of entity {} as {}",
            record_count,
            entity,
            backup_name
        );
        Ok(meta)
    }

    /// Restores a backup into its original entity, replacing the entity's
    /// current record set. Returns the number of records restored.
    pub fn restore_entity(&self, backup_name: &str) -> KeyvolveResult<u64> {
        let meta = self.backup_metadata(backup_name)?.ok_or_else(|| {
            KeyvolveError::new(
                &format!("Backup {} does not exist", backup_name),
                ErrorKind::NotFound,
            )
        })?;

        self.truncate_entity(&meta.original_entity)?;

        let data_prefix = Self::backup_data_prefix(backup_name);
        let entity_prefix = Self::entity_prefix(&meta.original_entity);
        let entries = self.store.scan_prefix(&data_prefix)?;
        let mut restored = 0u64;
        for page in entries.chunks(self.batch_size) {
            let mut txn = Transaction::new();
            for (key, value) in page {
                let id = &key[data_prefix.len()..];
                txn.put(&format!("{}{}", entity_prefix, id), value.clone());
                restored += 1;
            }
            self.store.commit(txn)?;
        }
        log::debug!(
            "Restored {} records of entity {} from backup {}",
            restored,
            meta.original_entity,
            backup_name
        );
        Ok(restored)
    }

    fn backup_metadata(&self, backup_name: &str) -> KeyvolveResult<Option<BackupMetadata>> {
        match self.store.get(&Self::backup_meta_key(backup_name))? {
            None => Ok(None),
            Some(Value::Record(rec)) => Ok(Some(BackupMetadata::from_record(&rec)?)),
            Some(other) => Err(KeyvolveError::new(
                &format!(
                    "Backup metadata for {} holds a {} value",
                    backup_name,
                    other.type_name()
                ),
                ErrorKind::InvalidDataType,
            )),
        }
    }

    /// Lists all backup snapshots in the store.
    pub fn list_backups(&self) -> KeyvolveResult<Vec<BackupMetadata>> {
        let meta_prefix = format!("{}{}", BACKUP_META_PREFIX, KEY_SEPARATOR);
        self.store
            .scan_prefix(&meta_prefix)?
            .iter()
            .map(|(key, value)| {
                Self::decode_record(key, value).and_then(|rec| BackupMetadata::from_record(&rec))
            })
            .collect()
    }

    /// Deletes a backup snapshot and its metadata.
    pub fn delete_backup(&self, backup_name: &str) -> KeyvolveResult<()> {
        let meta_key = Self::backup_meta_key(backup_name);
        if !self.store.contains_key(&meta_key)? {
            return Err(KeyvolveError::new(
                &format!("Backup {} does not exist", backup_name),
                ErrorKind::NotFound,
            ));
        }
        let mut txn = Transaction::new();
        txn.delete(&meta_key);
        for (key, _) in self.store.scan_prefix(&Self::backup_data_prefix(backup_name))? {
            txn.delete(&key);
        }
        self.store.commit(txn)
    }

    /// Builds a derived lookup table mapping each record's value of `field`
    /// to the record's primary key, in one scan. Returns the number of index
    /// entries written.
    pub fn create_index(&self, entity: &str, field: &str) -> KeyvolveResult<u64> {
        Self::validate_field(field)?;
        let index_prefix = Self::index_prefix(entity, field);
        let mut written = 0u64;
        self.batch_process(entity, |page, txn| {
            for (key, rec) in page {
                if !rec.contains_field(field) {
                    continue;
                }
                let component = Self::index_key_component(rec.get(field))?;
                txn.put(
                    &format!("{}{}", index_prefix, component),
                    Value::String(key.clone()),
                );
                written += 1;
            }
            Ok(())
        })?;
        log::debug!(
            "Indexed {} records of entity {} by field {}",
            written,
            entity,
            field
        );
        Ok(written)
    }

    /// Purges the derived lookup table for `entity`/`field`. Returns the
    /// number of index entries deleted.
    pub fn drop_index(&self, entity: &str, field: &str) -> KeyvolveResult<u64> {
        Self::validate_name(entity, "Entity")?;
        Self::validate_field(field)?;
        let entries = self.store.scan_prefix(&Self::index_prefix(entity, field))?;
        let dropped = entries.len() as u64;
        for page in entries.chunks(self.batch_size) {
            let mut txn = Transaction::new();
            for (key, _) in page {
                txn.delete(key);
            }
            self.store.commit(txn)?;
        }
        Ok(dropped)
    }

    fn validate_field(field: &str) -> KeyvolveResult<()> {
        if field.is_empty() {
            return Err(KeyvolveError::new(
                "Field name must not be empty",
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }

    fn index_key_component(value: &Value) -> KeyvolveResult<String> {
        match value {
            Value::Null => Ok("null".to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::I64(i) => Ok(i.to_string()),
            Value::F64(v) => Ok(v.to_string()),
            Value::String(s) => Ok(s.clone()),
            other => Err(KeyvolveError::new(
                &format!("Values of type {} cannot be indexed", other.type_name()),
                ErrorKind::InvalidDataType,
            )),
        }
    }
}
