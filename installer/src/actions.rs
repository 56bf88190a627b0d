//! Executes inline actions one at a time.
//!
//! Creations go through the [`Installer`] so they get the same normalization,
//! media handling, and reference linking as a full installation. A failing
//! action is reported and the next one still runs.

use std::fmt;

use tracing::{instrument, warn};

use crate::core::action::Action;
use crate::core::planner::{InstallPlan, plan};
use crate::core::slug::slugify;
use crate::core::synth::synthesize_fields;
use crate::core::types::RecordId;
use crate::install::{InstallProgress, Installer};
use crate::io::media::MediaStore;
use crate::io::platform::{Platform, PlatformError, RecordSummary, RecordUpdate};
use crate::resolver::{ReferenceIndex, ReferenceResolver};

/// Result of one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    SchemaCreated { title: String, slug: String },
    RecordCreated { title: String, id: RecordId },
    Skipped { title: String, reason: String },
    Updated { slug: String, fields: usize },
    Deleted { slug: String },
    Listed { schema: String, records: Vec<RecordSummary> },
    Schemas(Vec<(String, String)>),
    Failed { action: String, error: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::SchemaCreated { title, slug } => {
                write!(f, "created schema {title} ({slug})")
            }
            ActionOutcome::RecordCreated { title, id } => write!(f, "created record {title} ({id})"),
            ActionOutcome::Skipped { title, reason } => write!(f, "skipped {title}: {reason}"),
            ActionOutcome::Updated { slug, fields } => {
                write!(f, "updated {slug} ({fields} fields)")
            }
            ActionOutcome::Deleted { slug } => write!(f, "deleted {slug}"),
            ActionOutcome::Listed { schema, records } => {
                write!(f, "{schema}: {} records", records.len())?;
                for record in records {
                    write!(f, "\n  {} ({}, {})", record.title, record.slug, record.id)?;
                }
                Ok(())
            }
            ActionOutcome::Schemas(schemas) => {
                write!(f, "{} schemas", schemas.len())?;
                for (title, slug) in schemas {
                    write!(f, "\n  {title} ({slug})")?;
                }
                Ok(())
            }
            ActionOutcome::Failed { action, error } => write!(f, "failed to {action}: {error}"),
        }
    }
}

/// Run `actions` in order. Only an unreachable platform stops the sequence.
#[instrument(skip_all, fields(actions = actions.len()))]
pub async fn run_actions<P, M>(
    installer: &mut Installer<'_, P, M>,
    actions: Vec<Action>,
    on_outcome: &mut dyn FnMut(&ActionOutcome),
) -> Result<Vec<ActionOutcome>, PlatformError>
where
    P: Platform + ?Sized,
    M: MediaStore + ?Sized,
{
    let mut outcomes = Vec::with_capacity(actions.len());
    for action in actions {
        let label = action.to_string();
        let outcome = match run_action(installer, action).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_unavailable() => return Err(err),
            Err(err) => {
                warn!(action = %label, error = %err, "action failed");
                ActionOutcome::Failed {
                    action: label,
                    error: err.to_string(),
                }
            }
        };
        on_outcome(&outcome);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn run_action<P, M>(
    installer: &mut Installer<'_, P, M>,
    action: Action,
) -> Result<ActionOutcome, PlatformError>
where
    P: Platform + ?Sized,
    M: MediaStore + ?Sized,
{
    let platform = installer.platform();
    match action {
        Action::CreateRecord(record) => {
            let plan = plan(Vec::new(), vec![record], installer.catalog());
            install_one(installer, plan).await
        }
        Action::CreateSchema(schema) => {
            let plan = plan(vec![schema], Vec::new(), installer.catalog());
            install_one(installer, plan).await
        }
        Action::UpdateRecord {
            slug,
            schema,
            fields,
        } => {
            let id = find_id(platform, &slug).await?;
            let declared = schema
                .as_deref()
                .and_then(|reference| installer.catalog().get(reference))
                .map(|schema| schema.fields.clone())
                .unwrap_or_default();
            let mut fields = synthesize_fields(fields, &declared);
            let rewrite = ReferenceResolver::new(platform, ReferenceIndex::default())
                .rewrite(&fields)
                .await?;
            for changed in rewrite.changed {
                if let Some(field) = fields.iter_mut().find(|field| field.key == changed.key) {
                    *field = changed;
                }
            }
            let count = fields.len();
            platform.update_record(&id, &RecordUpdate { fields }).await?;
            Ok(ActionOutcome::Updated {
                slug,
                fields: count,
            })
        }
        Action::DeleteRecord { slug, .. } => {
            let id = find_id(platform, &slug).await?;
            platform.delete_record(&id).await?;
            Ok(ActionOutcome::Deleted { slug })
        }
        Action::ListRecords { schema } => {
            let schema = installer
                .catalog()
                .resolve_slug(&schema)
                .map_or(schema.clone(), str::to_string);
            let records = platform.list_records(&schema).await?;
            Ok(ActionOutcome::Listed { schema, records })
        }
        Action::ListSchemas => {
            let schemas = platform
                .list_schemas()
                .await?
                .into_iter()
                .map(|schema| {
                    let slug = schema.effective_slug();
                    (schema.title, slug)
                })
                .collect();
            Ok(ActionOutcome::Schemas(schemas))
        }
    }
}

async fn find_id<P: Platform + ?Sized>(platform: &P, slug: &str) -> Result<RecordId, PlatformError> {
    platform
        .find_record_by_slug(&slugify(slug))
        .await?
        .ok_or_else(|| PlatformError::NotFound(format!("no record with slug '{slug}'")))
}

/// Install a single-step plan and translate its progress into an outcome.
async fn install_one<P, M>(
    installer: &mut Installer<'_, P, M>,
    plan: InstallPlan,
) -> Result<ActionOutcome, PlatformError>
where
    P: Platform + ?Sized,
    M: MediaStore + ?Sized,
{
    let mut outcome = None;
    installer
        .install(plan, &mut |event| {
            let translated = match event {
                InstallProgress::SchemaCreated { title, slug } => ActionOutcome::SchemaCreated {
                    title: title.clone(),
                    slug: slug.clone(),
                },
                InstallProgress::RecordCreated { title, id } => ActionOutcome::RecordCreated {
                    title: title.clone(),
                    id: id.clone(),
                },
                InstallProgress::SchemaSkipped { title, reason }
                | InstallProgress::RecordSkipped { title, reason } => ActionOutcome::Skipped {
                    title: title.clone(),
                    reason: reason.clone(),
                },
                InstallProgress::SchemaFailed { title, error }
                | InstallProgress::RecordFailed { title, error } => ActionOutcome::Failed {
                    action: format!("create {title}"),
                    error: error.clone(),
                },
                InstallProgress::ReferencesUpdated { .. }
                | InstallProgress::ReferenceUpdateFailed { .. } => return,
            };
            outcome.get_or_insert(translated);
        })
        .await?;
    outcome.ok_or_else(|| PlatformError::Rejected("nothing was submitted".to_string()))
}
