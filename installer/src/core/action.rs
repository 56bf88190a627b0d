//! Inline actions carried by an `ACTION` sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::core::types::{ContentRecord, SchemaDefinition};

/// One platform operation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    #[serde(alias = "create")]
    CreateRecord(ContentRecord),
    #[serde(alias = "update")]
    UpdateRecord {
        #[serde(alias = "id")]
        slug: String,
        #[serde(default, rename = "type", alias = "schema", alias = "collection")]
        schema: Option<String>,
        #[serde(default, alias = "metadata", alias = "data", alias = "values")]
        fields: Map<String, Value>,
    },
    #[serde(alias = "delete")]
    DeleteRecord {
        #[serde(alias = "id")]
        slug: String,
        #[serde(default, rename = "type", alias = "schema", alias = "collection")]
        schema: Option<String>,
    },
    #[serde(alias = "list")]
    ListRecords {
        #[serde(rename = "type", alias = "schema", alias = "collection")]
        schema: String,
    },
    CreateSchema(SchemaDefinition),
    ListSchemas,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateRecord(record) => {
                write!(f, "create record {} [{}]", record.title, record.schema)
            }
            Action::UpdateRecord { slug, fields, .. } => {
                write!(f, "update record {slug} ({} fields)", fields.len())
            }
            Action::DeleteRecord { slug, .. } => write!(f, "delete record {slug}"),
            Action::ListRecords { schema } => write!(f, "list records [{schema}]"),
            Action::CreateSchema(schema) => write!(f, "create schema {}", schema.title),
            Action::ListSchemas => f.write_str("list schemas"),
        }
    }
}

/// Parse an action payload: one object or an array of objects.
///
/// Items that do not describe a known action are skipped with a warning.
pub fn parse_actions(payload: Value) -> Vec<Action> {
    let items = match payload {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<Action>(item) {
            Ok(action) => Some(action),
            Err(err) => {
                warn!(index = idx, error = %err, "skipping malformed action");
                None
            }
        })
        .collect()
}
