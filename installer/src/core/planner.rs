//! Installation ordering: every schema, then records by dependency depth.
//!
//! Depth is approximated by the number of relation fields declared on the
//! owning schema, not on the record itself. Records are stable-sorted, so
//! records of equal depth keep their input order.

use crate::core::catalog::SchemaCatalog;
use crate::core::slug::slugify;
use crate::core::types::{ContentRecord, SchemaDefinition};

/// One submission the installer performs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    CreateSchema(SchemaDefinition),
    CreateRecord(ContentRecord),
}

impl PlanStep {
    pub fn title(&self) -> &str {
        match self {
            PlanStep::CreateSchema(schema) => &schema.title,
            PlanStep::CreateRecord(record) => &record.title,
        }
    }
}

/// Ordered execution plan for one installation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallPlan {
    pub steps: Vec<PlanStep>,
}

impl InstallPlan {
    pub fn schema_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::CreateSchema(_)))
            .count()
    }

    pub fn record_count(&self) -> usize {
        self.steps.len() - self.schema_count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// One human-readable line per step, numbered from 1.
    pub fn describe(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(idx, step)| match step {
                PlanStep::CreateSchema(schema) => format!(
                    "{}. schema {} ({}, {} fields)",
                    idx + 1,
                    schema.title,
                    schema.effective_slug(),
                    schema.fields.len()
                ),
                PlanStep::CreateRecord(record) => {
                    format!("{}. record {} [{}]", idx + 1, record.title, record.schema)
                }
            })
            .collect()
    }
}

/// Build the plan for `schemas` and `records`.
///
/// Relation counts come from this batch's schemas first, then from schemas
/// already known to the platform. An unknown owning schema counts as zero.
pub fn plan(
    schemas: Vec<SchemaDefinition>,
    records: Vec<ContentRecord>,
    known: &SchemaCatalog,
) -> InstallPlan {
    let depth = |record: &ContentRecord| -> usize {
        let owner = &record.schema;
        schemas
            .iter()
            .find(|schema| {
                let slug = schema.effective_slug();
                slug == *owner || slug == slugify(owner)
            })
            .or_else(|| known.get(owner))
            .map_or(0, SchemaDefinition::relation_field_count)
    };

    let mut ordered: Vec<(usize, ContentRecord)> = records
        .into_iter()
        .map(|record| (depth(&record), record))
        .collect();
    ordered.sort_by_key(|(depth, _)| *depth);

    let mut steps: Vec<PlanStep> = schemas.into_iter().map(PlanStep::CreateSchema).collect();
    steps.extend(
        ordered
            .into_iter()
            .map(|(_, record)| PlanStep::CreateRecord(record)),
    );
    InstallPlan { steps }
}
