//! Shared data model for extracted payloads.
//!
//! These types mirror the JSON shapes the model is instructed to emit. They are
//! deliberately tolerant on input (aliases for common spellings, defaults for
//! omitted fields) and strict about the invariants the installer relies on once
//! a value has been normalized.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::core::slug::slugify;

/// Closed set of field type tags understood by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[serde(alias = "text", alias = "string", alias = "plain_text")]
    PlainText,
    #[serde(alias = "textarea", alias = "long_text")]
    LongText,
    #[serde(alias = "richtext", alias = "rich_text", alias = "html")]
    RichText,
    #[serde(alias = "md")]
    Markdown,
    #[serde(alias = "integer", alias = "float", alias = "decimal")]
    Number,
    #[serde(alias = "datetime")]
    Date,
    #[serde(alias = "file", alias = "image", alias = "single_file")]
    SingleFile,
    #[serde(alias = "files", alias = "images", alias = "gallery", alias = "multi_file")]
    MultiFile,
    #[serde(alias = "relation", alias = "reference", alias = "single_relation")]
    SingleRelation,
    #[serde(alias = "relations", alias = "references", alias = "multi_relation")]
    MultiRelation,
    #[serde(alias = "bool", alias = "checkbox")]
    Boolean,
    #[serde(alias = "select", alias = "dropdown", alias = "single_select")]
    SingleSelect,
    #[serde(alias = "tags", alias = "multi_select")]
    MultiSelect,
    #[serde(alias = "repeater", alias = "group", alias = "repeating_group")]
    RepeatingGroup,
    /// Omitted or unrecognized tag; resolved during normalization.
    #[default]
    #[serde(other)]
    Unspecified,
}

impl FieldType {
    pub fn is_relation(self) -> bool {
        matches!(self, FieldType::SingleRelation | FieldType::MultiRelation)
    }

    pub fn is_file(self) -> bool {
        matches!(self, FieldType::SingleFile | FieldType::MultiFile)
    }

    /// Types whose descriptor carries an `options` list.
    pub fn carries_options(self) -> bool {
        matches!(
            self,
            FieldType::SingleSelect | FieldType::MultiSelect | FieldType::Boolean
        )
    }
}

/// Identifier assigned to every field at installation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Platform-assigned opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JSON shape of a resolved relation value. Pending relations are plain slug strings.
pub fn resolved_reference(id: &RecordId) -> Value {
    json!({ "id": id.as_str() })
}

/// One field inside a schema (or a repeating group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FieldId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub key: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "related_schema",
        alias = "relatedTo"
    )]
    pub related_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "fields")]
    pub children: Vec<FieldDescriptor>,
}

/// A record type the platform understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub title: String,
    /// Requested slug, or the platform-confirmed slug once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "singularTitle")]
    pub singular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "emoji")]
    pub icon: Option<String>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDefinition {
    /// Slug the platform will use: the requested one, else derived from the title.
    pub fn effective_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&self.title),
        }
    }

    pub fn relation_field_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| field.field_type.is_relation())
            .count()
    }
}

/// One field value on a record.
///
/// For single-relation fields `value` is either a pending slug string or a
/// resolved `{"id": ...}` reference, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FieldId>,
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "related_schema",
        alias = "relatedTo"
    )]
    pub related_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Repeating-group rows, each a nested field list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Vec<FieldValue>>,
}

/// One record to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Owning schema slug.
    #[serde(rename = "type", alias = "schema", alias = "collection")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "image")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldValue>,
    /// Flat key/value form; folded into `fields` during normalization.
    #[serde(
        default,
        skip_serializing_if = "Map::is_empty",
        alias = "data",
        alias = "values"
    )]
    pub metadata: Map<String, Value>,
}

impl ContentRecord {
    /// Slug requested by the model, else derived from the title.
    pub fn requested_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_accepts_aliases_and_unknown_tags() {
        let parsed: Vec<FieldType> =
            serde_json::from_str(r#"["text","relation","rich-text","hologram"]"#).expect("parse");
        assert_eq!(
            parsed,
            vec![
                FieldType::PlainText,
                FieldType::SingleRelation,
                FieldType::RichText,
                FieldType::Unspecified,
            ]
        );
    }

    #[test]
    fn record_accepts_type_and_metadata_spelling() {
        let record: ContentRecord = serde_json::from_str(
            r#"{"type":"authors","title":"Jane Doe","metadata":{"bio":"Writer"}}"#,
        )
        .expect("parse");
        assert_eq!(record.schema, "authors");
        assert_eq!(record.requested_slug(), "jane-doe");
        assert_eq!(record.metadata.get("bio"), Some(&Value::from("Writer")));
    }

    #[test]
    fn schema_slug_falls_back_to_title() {
        let schema: SchemaDefinition =
            serde_json::from_str(r#"{"title":"Blog Posts","slug":"  "}"#).expect("parse");
        assert_eq!(schema.effective_slug(), "blog-posts");
    }

    #[test]
    fn relation_count_only_counts_relation_types() {
        let schema: SchemaDefinition = serde_json::from_str(
            r#"{"title":"Posts","fields":[
                {"key":"category","type":"single-relation","relatedSchema":"categories"},
                {"key":"tags","type":"multi-relation","relatedSchema":"tags"},
                {"key":"body","type":"rich-text"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(schema.relation_field_count(), 2);
    }
}
