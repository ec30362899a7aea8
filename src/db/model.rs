//! Write payloads and row decoding used by repositories.
//!
//! Keep these focused on moving data between JSON bodies and columns.
//! Validation lives in `crate::validate`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::model::Record;
use crate::resource::{Resource, Schema, PAYLOAD_COLUMN, SYSTEM_KEYS};

/// Column/value pairs to write, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnValues {
    pub values: Vec<(&'static str, Option<String>)>,
    /// Merge each value into the stored JSON (`json_patch`) instead of
    /// overwriting the column.
    pub patch: bool,
}

impl ColumnValues {
    /// Every declared column, with absent keys written as NULL. Used on insert.
    pub fn for_insert(resource: &Resource, body: &Map<String, Value>) -> Result<Self> {
        match resource.schema {
            Schema::Fields(fields) => Ok(Self {
                values: fields
                    .iter()
                    .map(|f| (f.column, body.get(f.key).and_then(text_of)))
                    .collect(),
                patch: false,
            }),
            Schema::Document => Ok(Self {
                values: vec![(PAYLOAD_COLUMN, Some(document_payload(body)?))],
                patch: false,
            }),
        }
    }

    /// Only the declared keys present in `body`. Used on partial update.
    /// Documents are merged key by key into the stored payload.
    pub fn for_update(resource: &Resource, body: &Map<String, Value>) -> Result<Self> {
        match resource.schema {
            Schema::Fields(fields) => Ok(Self {
                values: fields
                    .iter()
                    .filter(|f| body.contains_key(f.key))
                    .map(|f| (f.column, body.get(f.key).and_then(text_of)))
                    .collect(),
                patch: false,
            }),
            Schema::Document => Ok(Self {
                values: vec![(PAYLOAD_COLUMN, Some(document_payload(body)?))],
                patch: true,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn text_of(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn document_payload(body: &Map<String, Value>) -> Result<String> {
    let filtered: Map<String, Value> = body
        .iter()
        .filter(|(k, _)| !SYSTEM_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::to_string(&filtered).context("failed to encode document payload")
}

/// Decode a row selected with [`Resource::select_list`].
pub fn record_from_row(resource: &Resource, row: &SqliteRow) -> Result<Record> {
    let id: i64 = row.try_get("id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let fields = match resource.schema {
        Schema::Fields(rules) => {
            let mut fields = Map::new();
            for rule in rules {
                let value: Option<String> = row.try_get(rule.column)?;
                fields.insert(
                    rule.key.to_string(),
                    value.map(Value::String).unwrap_or(Value::Null),
                );
            }
            fields
        }
        Schema::Document => {
            let raw: String = row.try_get(PAYLOAD_COLUMN)?;
            match serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("{} {} has a corrupt payload", resource.table, id))?
            {
                Value::Object(map) => map,
                other => {
                    return Err(anyhow!(
                        "{} {} payload is not an object: {}",
                        resource.table,
                        id,
                        other
                    ))
                }
            }
        }
    };

    Ok(Record {
        id,
        created_at,
        updated_at,
        fields,
    })
}
