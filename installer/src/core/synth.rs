//! Field synthesis and normalization ahead of submission.
//!
//! Schema-declared typing always wins. Only when the owning schema has no field
//! for a key does the ordered [`INFERENCE_RULES`] table decide, falling back to
//! plain text.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::core::slug::{key_from_title, title_from_key};
use crate::core::types::{
    ContentRecord, FieldDescriptor, FieldId, FieldType, FieldValue, SchemaDefinition,
};

const IMAGE_TOKENS: &[&str] = &["image", "photo", "thumbnail", "picture", "gallery"];
const CONTENT_TOKENS: &[&str] = &["content", "body", "description"];

/// One heuristic: a predicate over `(lowercased key, value)` and the type it implies.
pub struct InferenceRule {
    pub name: &'static str,
    pub matches: fn(&str, &Value) -> bool,
    pub field_type: FieldType,
}

/// Heuristics evaluated in order when no schema-declared type exists.
pub const INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        name: "image-list",
        matches: is_image_list,
        field_type: FieldType::MultiFile,
    },
    InferenceRule {
        name: "image",
        matches: is_image_scalar,
        field_type: FieldType::SingleFile,
    },
    InferenceRule {
        name: "content",
        matches: is_content_key,
        field_type: FieldType::RichText,
    },
    InferenceRule {
        name: "date",
        matches: is_date_key,
        field_type: FieldType::Date,
    },
    InferenceRule {
        name: "boolean",
        matches: is_boolean_value,
        field_type: FieldType::Boolean,
    },
];

fn has_token(key: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| key.contains(token))
}

fn is_image_list(key: &str, value: &Value) -> bool {
    value.is_array() && has_token(key, IMAGE_TOKENS)
}

fn is_image_scalar(key: &str, value: &Value) -> bool {
    !value.is_array() && !value.is_object() && has_token(key, IMAGE_TOKENS)
}

fn is_content_key(key: &str, _value: &Value) -> bool {
    has_token(key, CONTENT_TOKENS)
}

fn is_date_key(key: &str, _value: &Value) -> bool {
    key.contains("date")
}

fn is_boolean_value(_key: &str, value: &Value) -> bool {
    value.is_boolean()
}

/// Type for a key the owning schema does not declare.
pub fn infer_field_type(key: &str, value: &Value) -> FieldType {
    let key = key.to_ascii_lowercase();
    INFERENCE_RULES
        .iter()
        .find(|rule| (rule.matches)(&key, value))
        .map_or(FieldType::PlainText, |rule| rule.field_type)
}

/// Resolve field types, fold the flat map into fields, and assign field ids.
///
/// Explicit field entries win over map entries with the same key; duplicate
/// keys after the first are dropped.
pub fn normalize_record(mut record: ContentRecord, schema: Option<&SchemaDefinition>) -> ContentRecord {
    let declared: &[FieldDescriptor] = schema.map_or(&[], |schema| schema.fields.as_slice());

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for mut field in std::mem::take(&mut record.fields) {
        normalize_field(&mut field, declared);
        if seen.insert(field.key.clone()) {
            fields.push(field);
        } else {
            warn!(record = %record.title, key = %field.key, "dropping duplicate field key");
        }
    }
    for field in synthesize_fields(std::mem::take(&mut record.metadata), declared) {
        if seen.insert(field.key.clone()) {
            fields.push(field);
        }
    }

    if record.slug.as_deref().is_none_or(|slug| slug.trim().is_empty()) {
        record.slug = Some(record.requested_slug());
    }
    record.fields = fields;
    record
}

/// Turn a flat key/value map into typed fields.
pub fn synthesize_fields(map: Map<String, Value>, declared: &[FieldDescriptor]) -> Vec<FieldValue> {
    map.into_iter()
        .map(|(key, value)| {
            let mut field = FieldValue {
                id: None,
                key,
                title: String::new(),
                field_type: FieldType::Unspecified,
                value,
                related_schema: None,
                options: Vec::new(),
                rows: Vec::new(),
            };
            normalize_field(&mut field, declared);
            field
        })
        .collect()
}

fn normalize_field(field: &mut FieldValue, declared: &[FieldDescriptor]) {
    field.id = Some(FieldId::fresh());
    if field.key.trim().is_empty() {
        field.key = key_from_title(&field.title);
    }

    let descriptor = declared.iter().find(|descriptor| descriptor.key == field.key);
    match descriptor {
        Some(descriptor) => apply_declared(field, descriptor),
        None if field.field_type == FieldType::Unspecified => {
            field.field_type = infer_field_type(&field.key, &field.value);
        }
        None => {}
    }
    if field.field_type == FieldType::Unspecified {
        field.field_type = FieldType::PlainText;
    }
    if field.title.trim().is_empty() {
        field.title = title_from_key(&field.key);
    }

    if field.field_type == FieldType::RepeatingGroup {
        let children = descriptor.map_or(&[][..], |descriptor| descriptor.children.as_slice());
        expand_rows(field, children);
    }
}

fn apply_declared(field: &mut FieldValue, descriptor: &FieldDescriptor) {
    if descriptor.field_type != FieldType::Unspecified {
        field.field_type = descriptor.field_type;
    }
    if field.title.trim().is_empty() {
        field.title = descriptor.title.clone();
    }
    if descriptor.field_type.is_relation() {
        field.related_schema = descriptor.related_schema.clone();
    }
    if descriptor.field_type.carries_options() {
        field.options = descriptor.options.clone();
    }
}

fn expand_rows(field: &mut FieldValue, children: &[FieldDescriptor]) {
    if field.rows.is_empty()
        && let Value::Array(items) = &field.value
    {
        field.rows = items
            .iter()
            .filter_map(Value::as_object)
            .map(|row| synthesize_fields(row.clone(), children))
            .collect();
        field.value = Value::Null;
        return;
    }
    for row in &mut field.rows {
        for child in row {
            normalize_field(child, children);
        }
    }
}

/// Prepare a schema for submission: fill keys and titles, assign fresh ids,
/// and drop duplicate keys.
pub fn normalize_schema(mut schema: SchemaDefinition) -> SchemaDefinition {
    schema.fields = normalize_descriptors(std::mem::take(&mut schema.fields), &schema.title);
    schema
}

fn normalize_descriptors(descriptors: Vec<FieldDescriptor>, owner: &str) -> Vec<FieldDescriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(descriptors.len());
    for mut descriptor in descriptors {
        descriptor.id = Some(FieldId::fresh());
        if descriptor.key.trim().is_empty() {
            descriptor.key = key_from_title(&descriptor.title);
        }
        if descriptor.title.trim().is_empty() {
            descriptor.title = title_from_key(&descriptor.key);
        }
        if descriptor.field_type == FieldType::Unspecified {
            descriptor.field_type = FieldType::PlainText;
        }
        if descriptor.field_type.is_relation() && descriptor.related_schema.is_none() {
            warn!(schema = %owner, key = %descriptor.key, "relation field has no related schema");
        }
        if !descriptor.children.is_empty() {
            descriptor.children =
                normalize_descriptors(std::mem::take(&mut descriptor.children), owner);
        }
        if seen.insert(descriptor.key.clone()) {
            out.push(descriptor);
        } else {
            warn!(schema = %owner, key = %descriptor.key, "dropping duplicate field key");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(json: Value) -> ContentRecord {
        serde_json::from_value(json).expect("record")
    }

    fn posts_schema() -> SchemaDefinition {
        serde_json::from_value(json!({
            "title": "Posts",
            "slug": "posts",
            "fields": [
                {"title": "Category", "key": "category", "type": "single-relation", "relatedSchema": "categories"},
                {"title": "Status", "key": "status", "type": "single-select", "options": ["draft", "live"]},
                {"title": "Sections", "key": "sections", "type": "repeating-group", "children": [
                    {"title": "Heading", "key": "heading", "type": "plain-text"},
                    {"title": "Hero", "key": "hero", "type": "single-file"}
                ]}
            ]
        }))
        .expect("schema")
    }

    #[test]
    fn undeclared_key_without_tokens_is_plain_text() {
        let normalized = normalize_record(
            record(json!({"type": "authors", "title": "Jane Doe", "metadata": {"bio": "Writer"}})),
            None,
        );
        assert_eq!(normalized.fields.len(), 1);
        let bio = &normalized.fields[0];
        assert_eq!(bio.key, "bio");
        assert_eq!(bio.title, "Bio");
        assert_eq!(bio.field_type, FieldType::PlainText);
        assert!(bio.id.is_some());
        assert!(normalized.metadata.is_empty());
        assert_eq!(normalized.slug.as_deref(), Some("jane-doe"));
    }

    #[test]
    fn metadata_keys_keep_their_written_order() {
        let normalized = normalize_record(
            record(json!({
                "type": "events",
                "title": "Launch",
                "metadata": {"venue": "Hall", "agenda": "Talks", "start_date": "2024-05-01"}
            })),
            None,
        );
        let keys: Vec<_> = normalized.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["venue", "agenda", "start_date"]);
    }

    #[test]
    fn heuristics_apply_in_order() {
        let cases = [
            ("gallery_images", json!(["a.png"]), FieldType::MultiFile),
            ("cover_image", json!("https://x/y.png"), FieldType::SingleFile),
            ("Thumbnail", json!("t.png"), FieldType::SingleFile),
            ("body", json!("<p>hi</p>"), FieldType::RichText),
            ("short_description", json!("x"), FieldType::RichText),
            ("publish_date", json!("2024-01-01"), FieldType::Date),
            ("featured", json!(true), FieldType::Boolean),
            ("photo_date", json!("2024-01-01"), FieldType::SingleFile),
            ("rating", json!(5), FieldType::PlainText),
        ];
        for (key, value, expected) in cases {
            assert_eq!(infer_field_type(key, &value), expected, "key {key}");
        }
    }

    #[test]
    fn schema_declared_type_wins_over_heuristics() {
        let schema = posts_schema();
        let normalized = normalize_record(
            record(json!({
                "type": "posts",
                "title": "Getting Started",
                "fields": [{"key": "status", "type": "boolean", "value": "draft"}],
                "metadata": {"category": "technology", "status": "ignored"}
            })),
            Some(&schema),
        );
        let category = normalized.fields.iter().find(|f| f.key == "category").expect("category");
        assert_eq!(category.field_type, FieldType::SingleRelation);
        assert_eq!(category.related_schema.as_deref(), Some("categories"));
        assert_eq!(category.title, "Category");

        let status: Vec<_> = normalized.fields.iter().filter(|f| f.key == "status").collect();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].field_type, FieldType::SingleSelect);
        assert_eq!(status[0].options, vec!["draft", "live"]);
        assert_eq!(status[0].value, json!("draft"));
    }

    #[test]
    fn repeating_group_rows_use_child_descriptors() {
        let schema = posts_schema();
        let normalized = normalize_record(
            record(json!({
                "type": "posts",
                "title": "Long Read",
                "metadata": {"sections": [
                    {"heading": "Intro", "hero": "https://img/1.png"},
                    {"heading": "Outro", "extra_body": "bye"}
                ]}
            })),
            Some(&schema),
        );
        let sections = &normalized.fields[0];
        assert_eq!(sections.field_type, FieldType::RepeatingGroup);
        assert_eq!(sections.value, Value::Null);
        assert_eq!(sections.rows.len(), 2);
        let hero = sections.rows[0].iter().find(|f| f.key == "hero").expect("hero");
        assert_eq!(hero.field_type, FieldType::SingleFile);
        let extra = sections.rows[1].iter().find(|f| f.key == "extra_body").expect("extra");
        assert_eq!(extra.field_type, FieldType::RichText);
        assert!(sections.rows.iter().flatten().all(|f| f.id.is_some()));
    }

    #[test]
    fn schema_normalization_fills_keys_and_ids() {
        let schema: SchemaDefinition = serde_json::from_value(json!({
            "title": "Events",
            "fields": [
                {"title": "Start Date", "type": "date"},
                {"title": "Venue", "type": "relation"},
                {"key": "venue", "type": "text"},
                {"key": "notes", "type": "mystery"}
            ]
        }))
        .expect("schema");
        let normalized = normalize_schema(schema);
        let keys: Vec<_> = normalized.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["start_date", "venue", "notes"]);
        assert_eq!(normalized.fields[2].field_type, FieldType::PlainText);
        assert_eq!(normalized.fields[2].title, "Notes");
        assert!(normalized.fields.iter().all(|f| f.id.is_some()));
    }
}
