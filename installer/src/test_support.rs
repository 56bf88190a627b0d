//! Test-only doubles and builders.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::core::slug::slugify;
use crate::core::types::{
    ContentRecord, FieldDescriptor, FieldType, FieldValue, RecordId, SchemaDefinition,
};
use crate::io::media::{MediaError, MediaHandle, MediaStore};
use crate::io::platform::{
    CreatedRecord, Platform, PlatformError, RecordPayload, RecordSummary, RecordUpdate,
};
use crate::io::store::{FileStore, StoredRecord};

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    schemas: Vec<SchemaDefinition>,
    records: Vec<StoredRecord>,
    calls: Vec<String>,
    slug_lookups: usize,
    updates: Vec<(RecordId, RecordUpdate)>,
    schema_failures: HashMap<String, PlatformError>,
    record_failures: HashMap<String, PlatformError>,
    lookup_failure: Option<PlatformError>,
    update_failure: Option<PlatformError>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(format!("rec_{:06}", self.next_id))
    }

    fn has_schema(&self, slug: &str) -> bool {
        self.schemas
            .iter()
            .any(|schema| schema.slug.as_deref() == Some(slug))
    }
}

/// In-memory platform that records calls and fails on request.
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory platform lock")
    }

    /// Register a pre-existing schema under its effective slug.
    pub fn seed_schema(&self, mut definition: SchemaDefinition) {
        definition.slug = Some(definition.effective_slug());
        self.state().schemas.push(definition);
    }

    /// Register a pre-existing record and return its id.
    pub fn seed_record(&self, schema: &str, title: &str) -> RecordId {
        let mut state = self.state();
        let id = state.allocate_id();
        state.records.push(StoredRecord {
            id: id.clone(),
            schema: schema.to_string(),
            title: title.to_string(),
            slug: slugify(title),
            thumbnail: None,
            fields: Vec::new(),
        });
        id
    }

    /// Fail every `create_schema` call for `title`.
    pub fn fail_schema(&self, title: &str, error: PlatformError) {
        self.state().schema_failures.insert(title.to_string(), error);
    }

    /// Fail every `create_record` call for `title`.
    pub fn fail_record(&self, title: &str, error: PlatformError) {
        self.state().record_failures.insert(title.to_string(), error);
    }

    pub fn fail_lookups(&self, error: PlatformError) {
        self.state().lookup_failure = Some(error);
    }

    pub fn fail_updates(&self, error: PlatformError) {
        self.state().update_failure = Some(error);
    }

    /// Number of `find_record_by_slug` calls made.
    pub fn slug_lookups(&self) -> usize {
        self.state().slug_lookups
    }

    /// Create calls in order: `schema:<title>` and `record:<title>`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn updates(&self) -> Vec<(RecordId, RecordUpdate)> {
        self.state().updates.clone()
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.state().records.clone()
    }

    pub fn record_by_title(&self, title: &str) -> Option<StoredRecord> {
        self.state()
            .records
            .iter()
            .find(|record| record.title == title)
            .cloned()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, PlatformError> {
        let mut state = self.state();
        state.calls.push(format!("schema:{}", definition.title));
        if let Some(error) = state.schema_failures.get(&definition.title) {
            return Err(error.clone());
        }
        let slug = definition.effective_slug();
        if state.has_schema(&slug) {
            return Err(PlatformError::Duplicate(format!("schema '{slug}' already exists")));
        }
        let mut stored = definition.clone();
        stored.slug = Some(slug.clone());
        state.schemas.push(stored);
        Ok(slug)
    }

    async fn create_record(&self, payload: &RecordPayload) -> Result<CreatedRecord, PlatformError> {
        let mut state = self.state();
        state.calls.push(format!("record:{}", payload.title));
        if let Some(error) = state.record_failures.get(&payload.title) {
            return Err(error.clone());
        }
        if !state.has_schema(&payload.schema) {
            return Err(PlatformError::Rejected(format!(
                "unknown schema '{}'",
                payload.schema
            )));
        }
        let slug = payload.slug.clone();
        if state
            .records
            .iter()
            .any(|record| record.schema == payload.schema && record.slug == slug)
        {
            return Err(PlatformError::Duplicate(format!("slug '{slug}' already exists")));
        }
        let id = state.allocate_id();
        state.records.push(StoredRecord {
            id: id.clone(),
            schema: payload.schema.clone(),
            title: payload.title.clone(),
            slug: slug.clone(),
            thumbnail: payload.thumbnail.clone(),
            fields: payload.fields.clone(),
        });
        Ok(CreatedRecord { id, slug })
    }

    async fn update_record(&self, id: &RecordId, update: &RecordUpdate) -> Result<(), PlatformError> {
        let mut state = self.state();
        if let Some(error) = &state.update_failure {
            return Err(error.clone());
        }
        state.updates.push((id.clone(), update.clone()));
        let record = state
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
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), PlatformError> {
        let mut state = self.state();
        let before = state.records.len();
        state.records.retain(|record| record.id != *id);
        if state.records.len() == before {
            return Err(PlatformError::NotFound(format!("record {id}")));
        }
        Ok(())
    }

    async fn find_record_by_slug(&self, slug: &str) -> Result<Option<RecordId>, PlatformError> {
        let mut state = self.state();
        state.slug_lookups += 1;
        if let Some(error) = &state.lookup_failure {
            return Err(error.clone());
        }
        Ok(state
            .records
            .iter()
            .find(|record| record.slug == slug)
            .map(|record| record.id.clone()))
    }

    async fn list_records(&self, schema: &str) -> Result<Vec<RecordSummary>, PlatformError> {
        Ok(self
            .state()
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
        Ok(self.state().schemas.clone())
    }
}

/// Media store that fails for listed URLs and numbers successful uploads.
#[derive(Default)]
pub struct ScriptedMedia {
    failing: Vec<String>,
    uploaded: Mutex<Vec<String>>,
}

impl ScriptedMedia {
    pub fn failing<'u>(urls: impl IntoIterator<Item = &'u str>) -> Self {
        Self {
            failing: urls.into_iter().map(str::to_string).collect(),
            uploaded: Mutex::default(),
        }
    }

    /// URLs uploaded successfully, in order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().expect("media lock").clone()
    }
}

#[async_trait]
impl MediaStore for ScriptedMedia {
    async fn upload_from_url(&self, url: &str) -> Result<MediaHandle, MediaError> {
        if self.failing.iter().any(|failing| failing == url) {
            return Err(MediaError::Fetch {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        let mut uploaded = self.uploaded.lock().expect("media lock");
        uploaded.push(url.to_string());
        Ok(MediaHandle(format!("media_{}", uploaded.len())))
    }
}

/// Schema with the given fields and no explicit slug.
pub fn schema(title: &str, fields: Vec<FieldDescriptor>) -> SchemaDefinition {
    SchemaDefinition {
        title: title.to_string(),
        slug: None,
        singular: None,
        icon: None,
        singleton: false,
        fields,
    }
}

pub fn descriptor(key: &str, field_type: FieldType) -> FieldDescriptor {
    FieldDescriptor {
        id: None,
        title: String::new(),
        key: key.to_string(),
        field_type,
        required: false,
        options: Vec::new(),
        related_schema: None,
        children: Vec::new(),
    }
}

/// Single-relation descriptor pointing at `target`.
pub fn relation(key: &str, target: &str) -> FieldDescriptor {
    FieldDescriptor {
        related_schema: Some(target.to_string()),
        ..descriptor(key, FieldType::SingleRelation)
    }
}

/// Record in flat key/value form; `metadata` must be a JSON object.
pub fn record(schema: &str, title: &str, metadata: Value) -> ContentRecord {
    ContentRecord {
        title: title.to_string(),
        slug: None,
        schema: schema.to_string(),
        thumbnail: None,
        fields: Vec::new(),
        metadata: metadata.as_object().cloned().unwrap_or_default(),
    }
}

pub fn field(key: &str, field_type: FieldType, value: Value) -> FieldValue {
    FieldValue {
        id: None,
        key: key.to_string(),
        title: String::new(),
        field_type,
        value,
        related_schema: None,
        options: Vec::new(),
        rows: Vec::new(),
    }
}

/// Temporary working directory for CLI and store tests.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create tempdir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` at `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Open the store at the default location inside the workspace.
    pub fn store(&self) -> Result<FileStore> {
        FileStore::open(&self.dir.path().join(".installer/store.json"))
    }
}
