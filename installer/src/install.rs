//! Drives an installation plan through the platform.
//!
//! Schemas first, then records in plan order, then the reference post-pass.
//! Each item's failure is reported and the run continues; only an unreachable
//! platform stops it.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::catalog::SchemaCatalog;
use crate::core::planner::{InstallPlan, PlanStep};
use crate::core::report::InstallationReport;
use crate::core::synth::{normalize_record, normalize_schema};
use crate::core::types::{ContentRecord, FieldValue, RecordId, SchemaDefinition};
use crate::io::media::{FallbackRotation, MediaStore, is_remote_url};
use crate::io::platform::{CreatedRecord, Platform, PlatformError, RecordPayload, RecordUpdate};
use crate::resolver::{ReferenceIndex, ReferenceResolver};

/// One completed step, reported between awaits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProgress {
    SchemaCreated { title: String, slug: String },
    SchemaSkipped { title: String, reason: String },
    SchemaFailed { title: String, error: String },
    RecordCreated { title: String, id: RecordId },
    RecordSkipped { title: String, reason: String },
    RecordFailed { title: String, error: String },
    ReferencesUpdated { title: String, fields: usize },
    ReferenceUpdateFailed { title: String, error: String },
}

impl fmt::Display for InstallProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallProgress::SchemaCreated { title, slug } => {
                write!(f, "created schema {title} ({slug})")
            }
            InstallProgress::SchemaSkipped { title, reason } => {
                write!(f, "skipped schema {title}: {reason}")
            }
            InstallProgress::SchemaFailed { title, error } => {
                write!(f, "failed schema {title}: {error}")
            }
            InstallProgress::RecordCreated { title, id } => {
                write!(f, "created record {title} ({id})")
            }
            InstallProgress::RecordSkipped { title, reason } => {
                write!(f, "skipped record {title}: {reason}")
            }
            InstallProgress::RecordFailed { title, error } => {
                write!(f, "failed record {title}: {error}")
            }
            InstallProgress::ReferencesUpdated { title, fields } => {
                write!(f, "linked {fields} reference field(s) on {title}")
            }
            InstallProgress::ReferenceUpdateFailed { title, error } => {
                write!(f, "failed to link references on {title}: {error}")
            }
        }
    }
}

/// A record the platform accepted, kept for the reference post-pass.
struct Created {
    created: CreatedRecord,
    requested: String,
    record: ContentRecord,
}

pub struct Installer<'a, P: Platform + ?Sized, M: MediaStore + ?Sized> {
    platform: &'a P,
    media: &'a M,
    catalog: SchemaCatalog,
    fallbacks: FallbackRotation,
}

impl<'a, P: Platform + ?Sized, M: MediaStore + ?Sized> Installer<'a, P, M> {
    pub fn new(platform: &'a P, media: &'a M, catalog: SchemaCatalog, fallbacks: FallbackRotation) -> Self {
        Self {
            platform,
            media,
            catalog,
            fallbacks,
        }
    }

    /// Seed the schema catalog from the platform's existing schemas.
    #[instrument(skip_all)]
    pub async fn connect(
        platform: &'a P,
        media: &'a M,
        fallbacks: FallbackRotation,
    ) -> Result<Self, PlatformError> {
        let existing = platform.list_schemas().await?;
        debug!(schemas = existing.len(), "seeded schema catalog");
        Ok(Self::new(
            platform,
            media,
            SchemaCatalog::from_existing(existing),
            fallbacks,
        ))
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn platform(&self) -> &'a P {
        self.platform
    }

    /// Execute `plan` and return the report.
    ///
    /// `progress` is called after every completed step. An `Unavailable`
    /// platform error ends the run and is returned instead of a report.
    #[instrument(skip_all, fields(steps = plan.steps.len()))]
    pub async fn install(
        &mut self,
        plan: InstallPlan,
        progress: &mut dyn FnMut(&InstallProgress),
    ) -> Result<InstallationReport, PlatformError> {
        let mut report = InstallationReport::default();
        let mut index = ReferenceIndex::default();
        let mut created = Vec::new();

        for step in plan.steps {
            match step {
                PlanStep::CreateSchema(definition) => {
                    self.submit_schema(definition, &mut report, progress).await?;
                }
                PlanStep::CreateRecord(record) => {
                    if let Some(entry) = self.submit_record(record, &mut report, progress).await? {
                        index.insert(&entry.created, &entry.requested, &entry.record.title);
                        created.push(entry);
                    }
                }
            }
        }

        self.resolve_references(index, &created, &mut report, progress)
            .await?;
        info!(
            schemas_created = report.schemas.created,
            records_created = report.records.created,
            failures = report.failures.len(),
            "installation finished"
        );
        Ok(report)
    }

    async fn submit_schema(
        &mut self,
        definition: SchemaDefinition,
        report: &mut InstallationReport,
        progress: &mut dyn FnMut(&InstallProgress),
    ) -> Result<(), PlatformError> {
        let definition = normalize_schema(definition);
        let title = definition.title.clone();
        match self.platform.create_schema(&definition).await {
            Ok(slug) => {
                report.schemas.created += 1;
                self.catalog.insert(slug.clone(), definition);
                progress(&InstallProgress::SchemaCreated { title, slug });
            }
            Err(err) if err.is_unavailable() => return Err(err),
            Err(err) if err.is_duplicate() => {
                report.schemas.skipped += 1;
                let slug = definition.effective_slug();
                if !self.catalog.contains(&slug) {
                    self.catalog.insert(slug, definition);
                }
                progress(&InstallProgress::SchemaSkipped {
                    title,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                warn!(schema = %title, error = %err, "schema creation failed");
                report.schemas.failed += 1;
                report.record_failure(&title, &err);
                progress(&InstallProgress::SchemaFailed {
                    title,
                    error: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn submit_record(
        &mut self,
        record: ContentRecord,
        report: &mut InstallationReport,
        progress: &mut dyn FnMut(&InstallProgress),
    ) -> Result<Option<Created>, PlatformError> {
        let schema = self.catalog.get(&record.schema).cloned();
        let mut record = normalize_record(record, schema.as_ref());
        if let Some(slug) = self.catalog.resolve_slug(&record.schema) {
            record.schema = slug.to_string();
        }
        self.ingest_media(&mut record).await;

        let title = record.title.clone();
        match self.platform.create_record(&RecordPayload::from_record(&record)).await {
            Ok(created) => {
                report.records.created += 1;
                progress(&InstallProgress::RecordCreated {
                    title,
                    id: created.id.clone(),
                });
                let requested = record.requested_slug();
                if created.slug != requested {
                    debug!(requested = %requested, assigned = %created.slug, "platform assigned a different slug");
                }
                Ok(Some(Created {
                    created,
                    requested,
                    record,
                }))
            }
            Err(err) if err.is_unavailable() => Err(err),
            Err(err) if err.is_duplicate() => {
                report.records.skipped += 1;
                progress(&InstallProgress::RecordSkipped {
                    title,
                    reason: err.to_string(),
                });
                Ok(None)
            }
            Err(err) => {
                warn!(record = %title, error = %err, "record creation failed");
                report.records.failed += 1;
                report.record_failure(&title, &err);
                progress(&InstallProgress::RecordFailed {
                    title,
                    error: err.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn resolve_references(
        &self,
        index: ReferenceIndex,
        created: &[Created],
        report: &mut InstallationReport,
        progress: &mut dyn FnMut(&InstallProgress),
    ) -> Result<(), PlatformError> {
        let mut resolver = ReferenceResolver::new(self.platform, index);
        for entry in created {
            let rewrite = resolver.rewrite(&entry.record.fields).await?;
            for slug in rewrite.unresolved {
                if !report.references.unresolved.contains(&slug) {
                    report.references.unresolved.push(slug);
                }
            }
            if rewrite.changed.is_empty() {
                continue;
            }
            let fields = rewrite.changed.len();
            let update = RecordUpdate {
                fields: rewrite.changed,
            };
            let title = entry.record.title.clone();
            match self.platform.update_record(&entry.created.id, &update).await {
                Ok(()) => {
                    report.references.updated += 1;
                    progress(&InstallProgress::ReferencesUpdated { title, fields });
                }
                Err(err) if err.is_unavailable() => return Err(err),
                Err(err) => {
                    warn!(record = %title, error = %err, "reference update failed");
                    report.references.update_failures += 1;
                    report.record_failure(&title, &err);
                    progress(&InstallProgress::ReferenceUpdateFailed {
                        title,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Upload the thumbnail and URL-valued file fields.
    async fn ingest_media(&mut self, record: &mut ContentRecord) {
        if let Some(url) = record.thumbnail.take() {
            let stored = if is_remote_url(&url) {
                self.upload(&url).await
            } else {
                url
            };
            record.thumbnail = Some(stored);
        }
        for value in file_values(&mut record.fields) {
            match value {
                Value::String(url) => {
                    if is_remote_url(url) {
                        let stored = self.upload(url).await;
                        *url = stored;
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::String(url) = item
                            && is_remote_url(url)
                        {
                            let stored = self.upload(url).await;
                            *url = stored;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    async fn upload(&mut self, url: &str) -> String {
        match self.media.upload_from_url(url).await {
            Ok(handle) => handle.0,
            Err(err) => match self.fallbacks.next_handle() {
                Some(fallback) => {
                    warn!(url = %url, error = %err, fallback = %fallback.as_str(), "upload failed; using fallback");
                    fallback.0
                }
                None => {
                    warn!(url = %url, error = %err, "upload failed; keeping url");
                    url.to_string()
                }
            },
        }
    }
}

fn file_values(fields: &mut [FieldValue]) -> Vec<&mut Value> {
    let mut out = Vec::new();
    for field in fields {
        if field.field_type.is_file() {
            out.push(&mut field.value);
        }
        for row in &mut field.rows {
            out.extend(file_values(row));
        }
    }
    out
}
