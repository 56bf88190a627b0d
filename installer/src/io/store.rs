//! JSON-file-backed platform used by the CLI.
//!
//! The whole document is rewritten atomically after every mutation. Record ids
//! are sequential (`rec_000001`) and slugs are unique per schema.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::slug::slugify;
use crate::core::types::{FieldValue, RecordId, SchemaDefinition};
use crate::io::atomic::write_atomic;
use crate::io::platform::{
    CreatedRecord, Platform, PlatformError, RecordPayload, RecordSummary, RecordUpdate,
};

/// A record as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub schema: String,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl StoredRecord {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|field| field.key == key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreDocument {
    next_id: u64,
    schemas: Vec<SchemaDefinition>,
    records: Vec<StoredRecord>,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl FileStore {
    /// Open the store at `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parse store {}", path.display()))?
        } else {
            StoreDocument::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc: Mutex::new(doc),
        })
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Result<Vec<StoredRecord>> {
        let doc = self
            .doc
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(doc.records.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreDocument>, PlatformError> {
        self.doc
            .lock()
            .map_err(|_| PlatformError::Unavailable("store lock poisoned".to_string()))
    }

    /// Apply `change` to a copy of the document and keep it only once it is
    /// written to disk.
    fn transact<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> Result<T, PlatformError>,
    ) -> Result<T, PlatformError> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *doc = next;
        Ok(out)
    }

    fn persist(&self, doc: &StoreDocument) -> Result<(), PlatformError> {
        let write = || -> Result<()> {
            let mut buf = serde_json::to_string_pretty(doc).context("serialize store")?;
            buf.push('\n');
            write_atomic(&self.path, buf.as_bytes())
        };
        write().map_err(|err| PlatformError::Unavailable(format!("{err:#}")))
    }
}

fn schema_exists(doc: &StoreDocument, slug: &str) -> bool {
    doc.schemas
        .iter()
        .any(|schema| schema.slug.as_deref() == Some(slug))
}

#[async_trait]
impl Platform for FileStore {
    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, PlatformError> {
        if definition.title.trim().is_empty() {
            return Err(PlatformError::Rejected("schema title is required".to_string()));
        }
        let slug = self.transact(|doc| {
            let slug = definition.effective_slug();
            if schema_exists(doc, &slug) {
                return Err(PlatformError::Duplicate(format!("schema '{slug}' already exists")));
            }
            let mut stored = definition.clone();
            stored.slug = Some(slug.clone());
            doc.schemas.push(stored);
            Ok(slug)
        })?;
        debug!(slug = %slug, "stored schema");
        Ok(slug)
    }

    async fn create_record(&self, payload: &RecordPayload) -> Result<CreatedRecord, PlatformError> {
        if payload.title.trim().is_empty() {
            return Err(PlatformError::Rejected("record title is required".to_string()));
        }
        let created = self.transact(|doc| {
            if !schema_exists(doc, &payload.schema) {
                return Err(PlatformError::Rejected(format!(
                    "unknown schema '{}'",
                    payload.schema
                )));
            }
            let slug = match slugify(&payload.slug) {
                slug if slug.is_empty() => slugify(&payload.title),
                slug => slug,
            };
            if doc
                .records
                .iter()
                .any(|record| record.schema == payload.schema && record.slug == slug)
            {
                return Err(PlatformError::Duplicate(format!(
                    "slug '{slug}' already exists"
                )));
            }
            doc.next_id += 1;
            let id = RecordId(format!("rec_{:06}", doc.next_id));
            doc.records.push(StoredRecord {
                id: id.clone(),
                schema: payload.schema.clone(),
                title: payload.title.clone(),
                slug: slug.clone(),
                thumbnail: payload.thumbnail.clone(),
                fields: payload.fields.clone(),
            });
            Ok(CreatedRecord { id, slug })
        })?;
        debug!(id = %created.id, slug = %created.slug, "stored record");
        Ok(created)
    }

    async fn update_record(&self, id: &RecordId, update: &RecordUpdate) -> Result<(), PlatformError> {
        self.transact(|doc| {
            let record = doc
                .records
                .iter_mut()
                .find(|record| record.id == *id)
                .ok_or_else(|| PlatformError::NotFound(format!("record {id}")))?;
            for field in &update.fields {
                match record.fields.iter_mut().find(|existing| existing.key == field.key) {
                    Some(existing) => *existing = field.clone(),
                    None => record.fields.push(field.clone()),
                }
            }
            Ok(())
        })
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), PlatformError> {
        self.transact(|doc| {
            let before = doc.records.len();
            doc.records.retain(|record| record.id != *id);
            if doc.records.len() == before {
                return Err(PlatformError::NotFound(format!("record {id}")));
            }
            Ok(())
        })
    }

    async fn find_record_by_slug(&self, slug: &str) -> Result<Option<RecordId>, PlatformError> {
        let doc = self.lock()?;
        Ok(doc
            .records
            .iter()
            .find(|record| record.slug == slug)
            .map(|record| record.id.clone()))
    }

    async fn list_records(&self, schema: &str) -> Result<Vec<RecordSummary>, PlatformError> {
        let doc = self.lock()?;
        if !schema_exists(&doc, schema) {
            return Err(PlatformError::NotFound(format!("schema '{schema}'")));
        }
        Ok(doc
            .records
            .iter()
            .filter(|record| record.schema == schema)
            .map(|record| RecordSummary {
                id: record.id.clone(),
                slug: record.slug.clone(),
                title: record.title.clone(),
                schema: record.schema.clone(),
            })
            .collect())
    }

    async fn list_schemas(&self) -> Result<Vec<SchemaDefinition>, PlatformError> {
        Ok(self.lock()?.schemas.clone())
    }
}
