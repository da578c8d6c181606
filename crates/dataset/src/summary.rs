use crate::failure::{Diagnostic, FailureKind};
use repotrace_indexer::SourceIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a run did, counted by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub indexed_files: usize,
    pub units: usize,
    pub opaque_units: usize,
    pub requests: usize,
    pub records_emitted: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    /// Summary seeded with index counts and one parse diagnostic per opaque file
    #[must_use]
    pub fn from_index(index: &SourceIndex) -> Self {
        let stats = index.stats();
        let mut summary = Self {
            indexed_files: stats.files_indexed,
            units: index.parsed_unit_count(),
            opaque_units: index.opaque_unit_count(),
            ..Self::default()
        };
        for failure in &stats.failures {
            summary.record(Diagnostic::parse(failure));
        }
        summary
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        *self.failures.entry(diagnostic.kind).or_insert(0) += 1;
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// Failures that cost a record, excluding advisory kinds
    #[must_use]
    pub fn dropped_requests(&self) -> usize {
        self.failures
            .iter()
            .filter(|(kind, _)| !kind.is_advisory())
            .map(|(_, count)| count)
            .sum()
    }

    /// Exit status rule: at least one unit indexed and one record emitted
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.units > 0 && self.records_emitted > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Indexed {} files: {} units ({} opaque)",
            self.indexed_files, self.units, self.opaque_units
        )?;
        write!(
            f,
            "Emitted {} of {} requested records",
            self.records_emitted, self.requests
        )?;
        for (kind, count) in &self.failures {
            write!(f, "\n  {kind}: {count}")?;
        }
        Ok(())
    }
}
