use crate::error::PersistenceError;
use crate::summary::RunSummary;
use chrono::{SecondsFormat, Utc};
use repotrace_indexer::SourceIndex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const RECORDS_FILE: &str = "records.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

/// End-of-run description of what was indexed and emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool: String,
    pub tool_version: String,
    pub repository: String,
    pub index_version: u64,
    pub index_fingerprint: String,

    /// RFC 3339, UTC
    pub generated_at: String,

    /// Indexed files, as found on disk
    pub files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    pub records_file: String,
    pub summary: RunSummary,
}

impl RunManifest {
    #[must_use]
    pub fn new(repository: &Path, index: &SourceIndex, features: &[String], summary: RunSummary) -> Self {
        Self {
            tool: "repotrace".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            repository: repository.display().to_string(),
            index_version: index.version(),
            index_fingerprint: index.fingerprint().to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            files: index.files().map(|file| file.original_path.clone()).collect(),
            features: features.to_vec(),
            records_file: RECORDS_FILE.to_string(),
            summary,
        }
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }
}
