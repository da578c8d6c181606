use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A file that could not be parsed and was indexed as an opaque leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub line: Option<usize>,
    pub message: String,
}

/// Statistics about an indexing operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Files handed to the indexer
    pub files_seen: usize,

    /// Files that produced an entry in the file table
    pub files_indexed: usize,

    /// Files skipped because their language is not supported
    pub files_skipped: usize,

    /// Units extracted from successfully parsed files
    pub parsed_units: usize,

    /// Opaque leaf units standing for unparseable files
    pub opaque_units: usize,

    /// Edges to units inside the repository
    pub internal_edges: usize,

    /// Edges to symbols defined outside the repository
    pub external_edges: usize,

    /// Total lines of code
    pub total_lines: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: BTreeMap<String, usize>,

    /// Parse failures, sorted by path
    pub failures: Vec<FileFailure>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, language: &str, lines: usize) {
        self.files_indexed += 1;
        self.total_lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_failure(&mut self, failure: FileFailure) {
        self.opaque_units += 1;
        self.failures.push(failure);
    }

    /// Units of any kind, opaque included
    #[must_use]
    pub const fn total_units(&self) -> usize {
        self.parsed_units + self.opaque_units
    }
}
