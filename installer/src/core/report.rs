//! Aggregate outcome of one installation run.

use serde::Serialize;

/// Created/skipped/failed counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of the reference-resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSummary {
    /// Records that received an update with at least one resolved reference.
    pub updated: usize,
    /// Slugs that matched nothing in the batch or the backend.
    pub unresolved: Vec<String>,
    pub update_failures: usize,
}

/// The only artifact an installation run returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallationReport {
    pub schemas: Tally,
    pub records: Tally,
    /// `<title>: <error>` lines in the order failures occurred.
    pub failures: Vec<String>,
    pub references: ReferenceSummary,
}

impl InstallationReport {
    pub fn record_failure(&mut self, title: &str, error: impl std::fmt::Display) {
        self.failures.push(format!("{title}: {error}"));
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Summary line, optional reference line, then one line per failure.
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "schemas: {} created, {} skipped, {} failed; records: {} created, {} skipped, {} failed",
            self.schemas.created,
            self.schemas.skipped,
            self.schemas.failed,
            self.records.created,
            self.records.skipped,
            self.records.failed,
        )];
        let refs = &self.references;
        if refs.updated > 0 || !refs.unresolved.is_empty() || refs.update_failures > 0 {
            lines.push(format!(
                "references: {} records updated, {} unresolved, {} update failures",
                refs.updated,
                refs.unresolved.len(),
                refs.update_failures
            ));
        }
        lines.extend(self.failures.iter().map(|failure| format!("  - {failure}")));
        lines
    }
}
