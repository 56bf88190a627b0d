//! Post-creation rewrite of slug-shaped relation values into record ids.
//!
//! Lookups go to the batch index first, then to a per-run cache of backend
//! answers (misses included), and only then to the backend. A slug nobody
//! knows is left in place.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::slug::slugify;
use crate::core::types::{FieldType, FieldValue, RecordId, resolved_reference};
use crate::io::platform::{CreatedRecord, Platform, PlatformError};

/// Slug to id map built from this run's own creations.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    by_slug: HashMap<String, RecordId>,
}

impl ReferenceIndex {
    /// Index a creation under its final slug, its requested slug, and its slugified title.
    pub fn insert(&mut self, created: &CreatedRecord, requested_slug: &str, title: &str) {
        for key in [created.slug.as_str(), requested_slug] {
            if !key.is_empty() {
                self.by_slug.insert(key.to_string(), created.id.clone());
            }
        }
        let from_title = slugify(title);
        if !from_title.is_empty() {
            self.by_slug.entry(from_title).or_insert_with(|| created.id.clone());
        }
    }

    pub fn get(&self, slug: &str) -> Option<&RecordId> {
        self.by_slug
            .get(slug)
            .or_else(|| self.by_slug.get(&slugify(slug)))
    }
}

/// Fields whose values changed, plus slugs that stayed unresolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rewrite {
    pub changed: Vec<FieldValue>,
    pub unresolved: Vec<String>,
}

/// Per-run resolver; discard after the run.
pub struct ReferenceResolver<'a, P: Platform + ?Sized> {
    platform: &'a P,
    index: ReferenceIndex,
    lookups: HashMap<String, Option<RecordId>>,
}

impl<'a, P: Platform + ?Sized> ReferenceResolver<'a, P> {
    pub fn new(platform: &'a P, index: ReferenceIndex) -> Self {
        Self {
            platform,
            index,
            lookups: HashMap::new(),
        }
    }

    /// Resolve one slug. Only an unreachable platform is an error.
    pub async fn resolve(&mut self, slug: &str) -> Result<Option<RecordId>, PlatformError> {
        if let Some(id) = self.index.get(slug) {
            return Ok(Some(id.clone()));
        }
        if let Some(cached) = self.lookups.get(slug) {
            return Ok(cached.clone());
        }
        let canonical = slugify(slug);
        let found = if canonical.is_empty() {
            None
        } else {
            match self.platform.find_record_by_slug(&canonical).await {
                Ok(found) => found,
                Err(err) if err.is_unavailable() => return Err(err),
                Err(PlatformError::NotFound(_)) => None,
                Err(err) => {
                    warn!(slug = %slug, error = %err, "slug lookup failed");
                    None
                }
            }
        };
        debug!(slug = %slug, hit = found.is_some(), "backend slug lookup");
        self.lookups.insert(slug.to_string(), found.clone());
        Ok(found)
    }

    /// Rewrite every pending relation value in `fields`.
    pub async fn rewrite(&mut self, fields: &[FieldValue]) -> Result<Rewrite, PlatformError> {
        let mut pending = BTreeSet::new();
        collect_pending(fields, &mut pending);

        let mut resolved = HashMap::new();
        let mut unresolved = Vec::new();
        for slug in pending {
            match self.resolve(&slug).await? {
                Some(id) => {
                    resolved.insert(slug, id);
                }
                None => unresolved.push(slug),
            }
        }

        let changed = fields
            .iter()
            .filter_map(|field| rewrite_field(field, &resolved))
            .collect();
        Ok(Rewrite {
            changed,
            unresolved,
        })
    }
}

fn pending_slug(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|slug| !slug.is_empty())
}

fn collect_pending(fields: &[FieldValue], out: &mut BTreeSet<String>) {
    for field in fields {
        match field.field_type {
            FieldType::SingleRelation => {
                out.extend(pending_slug(&field.value).map(str::to_string));
            }
            FieldType::MultiRelation => {
                if let Value::Array(items) = &field.value {
                    out.extend(items.iter().filter_map(pending_slug).map(str::to_string));
                }
            }
            _ => {}
        }
        for row in &field.rows {
            collect_pending(row, out);
        }
    }
}

fn resolve_value(value: &Value, resolved: &HashMap<String, RecordId>) -> Option<Value> {
    let id = resolved.get(pending_slug(value)?)?;
    Some(resolved_reference(id))
}

/// Rewritten copy of `field`, or `None` when nothing in it changed.
fn rewrite_field(field: &FieldValue, resolved: &HashMap<String, RecordId>) -> Option<FieldValue> {
    let mut out = field.clone();
    let mut changed = false;

    match field.field_type {
        FieldType::SingleRelation => {
            if let Some(value) = resolve_value(&field.value, resolved) {
                out.value = value;
                changed = true;
            }
        }
        FieldType::MultiRelation => {
            if let Value::Array(items) = &mut out.value {
                for item in items {
                    if let Some(value) = resolve_value(item, resolved) {
                        *item = value;
                        changed = true;
                    }
                }
            }
        }
        _ => {}
    }

    for row in &mut out.rows {
        for child in row {
            if let Some(rewritten) = rewrite_field(child, resolved) {
                *child = rewritten;
                changed = true;
            }
        }
    }

    changed.then_some(out)
}
