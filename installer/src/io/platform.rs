//! Remote content platform boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ContentRecord, FieldValue, RecordId, SchemaDefinition};

/// Failure reported by the platform for one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    /// The platform could not be reached at all; aborts an installation run.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    /// Duplicate by variant, or by the wording of any other error's message.
    pub fn is_duplicate(&self) -> bool {
        match self {
            PlatformError::Duplicate(_) => true,
            PlatformError::NotFound(msg)
            | PlatformError::Rejected(msg)
            | PlatformError::Unavailable(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("already exists") || msg.contains("duplicate")
            }
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PlatformError::Unavailable(_))
    }
}

/// Identity of a record the platform created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: RecordId,
    pub slug: String,
}

/// Record as submitted for creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub schema: String,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub fields: Vec<FieldValue>,
}

impl RecordPayload {
    /// Payload for a normalized record.
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            schema: record.schema.clone(),
            title: record.title.clone(),
            slug: record.requested_slug(),
            thumbnail: record.thumbnail.clone(),
            fields: record.fields.clone(),
        }
    }
}

/// Partial update: each listed field replaces the stored field with the same key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub fields: Vec<FieldValue>,
}

/// Listing entry for an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub slug: String,
    pub title: String,
    pub schema: String,
}

/// CRUD surface the installer and the action executor need.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a schema and return the slug the platform assigned.
    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, PlatformError>;

    async fn create_record(&self, payload: &RecordPayload) -> Result<CreatedRecord, PlatformError>;

    async fn update_record(&self, id: &RecordId, update: &RecordUpdate) -> Result<(), PlatformError>;

    async fn delete_record(&self, id: &RecordId) -> Result<(), PlatformError>;

    /// `Ok(None)` when no record carries `slug`.
    async fn find_record_by_slug(&self, slug: &str) -> Result<Option<RecordId>, PlatformError>;

    async fn list_records(&self, schema: &str) -> Result<Vec<RecordSummary>, PlatformError>;

    /// Existing schemas with their fields.
    async fn list_schemas(&self) -> Result<Vec<SchemaDefinition>, PlatformError>;
}
