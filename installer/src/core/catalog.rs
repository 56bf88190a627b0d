//! In-memory view of the schemas known during one installation run.

use std::collections::BTreeMap;

use crate::core::slug::slugify;
use crate::core::types::SchemaDefinition;

/// Schemas keyed by platform slug: pre-existing ones plus those created this run.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, SchemaDefinition>,
}

impl SchemaCatalog {
    pub fn from_existing(definitions: Vec<SchemaDefinition>) -> Self {
        let mut catalog = Self::default();
        for definition in definitions {
            let slug = definition.effective_slug();
            catalog.insert(slug, definition);
        }
        catalog
    }

    /// Record `definition` under its confirmed `slug`.
    pub fn insert(&mut self, slug: String, mut definition: SchemaDefinition) {
        definition.slug = Some(slug.clone());
        self.schemas.insert(slug, definition);
    }

    /// Look up by slug; a title-shaped reference is slugified as a fallback.
    pub fn get(&self, reference: &str) -> Option<&SchemaDefinition> {
        self.schemas
            .get(reference)
            .or_else(|| self.schemas.get(&slugify(reference)))
    }

    /// Confirmed slug for a schema reference, if known.
    pub fn resolve_slug(&self, reference: &str) -> Option<&str> {
        if let Some((slug, _)) = self.schemas.get_key_value(reference) {
            return Some(slug.as_str());
        }
        self.schemas
            .get_key_value(&slugify(reference))
            .map(|(slug, _)| slug.as_str())
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.get(reference).is_some()
    }
}
