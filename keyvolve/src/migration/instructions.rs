use crate::common::Value;
use crate::errors::KeyvolveResult;
use crate::migration::SchemaUtils;
use serde::{Deserialize, Serialize};

/// One declarative schema operation, as authored in migration files.
///
/// Each variant maps onto a [SchemaUtils] call; a migration file's `up` and
/// `down` sections are ordered lists of these. The serialized form tags each
/// entry with an `op` discriminator:
///
/// ```json
/// { "op": "add_field", "entity": "users", "field": "status", "value": "active" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    AddField {
        entity: String,
        field: String,
        value: Value,
    },
    RemoveField {
        entity: String,
        field: String,
    },
    RenameField {
        entity: String,
        from: String,
        to: String,
    },
    TransformNumberToString {
        entity: String,
        field: String,
    },
    TransformStringToNumber {
        entity: String,
        field: String,
    },
    CopyEntity {
        from: String,
        to: String,
    },
    RenameEntity {
        from: String,
        to: String,
    },
    TruncateEntity {
        entity: String,
    },
    CreateIndex {
        entity: String,
        field: String,
    },
    DropIndex {
        entity: String,
        field: String,
    },
    BackupEntity {
        entity: String,
        backup_name: String,
    },
    RestoreEntity {
        backup_name: String,
    },
    DeleteBackup {
        backup_name: String,
    },
}

impl SchemaOp {
    /// Executes this operation through the given utilities.
    pub fn apply(&self, utils: &SchemaUtils) -> KeyvolveResult<()> {
        match self {
            SchemaOp::AddField { entity, field, value } => {
                utils.add_field(entity, field, value.clone()).map(|_| ())
            }
            SchemaOp::RemoveField { entity, field } => {
                utils.remove_field(entity, field).map(|_| ())
            }
            SchemaOp::RenameField { entity, from, to } => {
                utils.rename_field(entity, from, to).map(|_| ())
            }
            SchemaOp::TransformNumberToString { entity, field } => utils
                .transform_field(entity, field, |value| match value {
                    Value::I64(n) => Ok(Value::from(n.to_string())),
                    Value::F64(n) => Ok(Value::from(n.to_string())),
                    other => Ok(other.clone()),
                })
                .map(|_| ()),
            SchemaOp::TransformStringToNumber { entity, field } => utils
                .transform_field(entity, field, |value| match value {
                    Value::String(s) => match s.parse::<i64>() {
                        Ok(n) => Ok(Value::from(n)),
                        // Unparseable strings pass through untouched
                        Err(_) => Ok(value.clone()),
                    },
                    other => Ok(other.clone()),
                })
                .map(|_| ()),
            SchemaOp::CopyEntity { from, to } => utils.copy_entity(from, to).map(|_| ()),
            SchemaOp::RenameEntity { from, to } => utils.rename_entity(from, to).map(|_| ()),
            SchemaOp::TruncateEntity { entity } => utils.truncate_entity(entity).map(|_| ()),
            SchemaOp::CreateIndex { entity, field } => {
                utils.create_index(entity, field).map(|_| ())
            }
            SchemaOp::DropIndex { entity, field } => utils.drop_index(entity, field).map(|_| ()),
            SchemaOp::BackupEntity { entity, backup_name } => {
                utils.backup_entity(entity, backup_name).map(|_| ())
            }
            SchemaOp::RestoreEntity { backup_name } => {
                utils.restore_entity(backup_name).map(|_| ())
            }
            SchemaOp::DeleteBackup { backup_name } => utils.delete_backup(backup_name),
        }
    }
}
