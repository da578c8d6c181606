use serde::{Deserialize, Serialize};

/// Configuration for unit extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Files larger than this are treated as unparseable
    pub max_file_bytes: usize,

    /// Maximum raw references kept per unit (source order)
    pub max_references_per_unit: usize,

    /// Record type references in addition to calls
    pub include_type_references: bool,

    /// Include documentation/docstrings
    pub include_documentation: bool,

    /// Languages to support (empty = all supported languages)
    pub supported_languages: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_references_per_unit: 256,
            include_type_references: true,
            include_documentation: true,
            supported_languages: vec![],
        }
    }
}

impl AnalyzerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_file_bytes == 0 {
            return Err("max_file_bytes must be > 0".to_string());
        }

        if self.max_references_per_unit == 0 {
            return Err("max_references_per_unit must be > 0".to_string());
        }

        for lang in &self.supported_languages {
            if !matches!(
                lang.as_str(),
                "rust" | "python" | "javascript" | "typescript"
            ) {
                return Err(format!("unsupported language in supported_languages: {lang}"));
            }
        }

        Ok(())
    }
}
