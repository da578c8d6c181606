use crate::ast_analyzer::AstAnalyzer;
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::language::Language;
use crate::types::FileAnalysis;
use std::path::Path;

/// Main entry point for turning source files into unit drafts
#[derive(Debug, Clone)]
pub struct SourceAnalyzer {
    config: AnalyzerConfig,
}

impl SourceAnalyzer {
    /// Create a new analyzer, rejecting invalid configuration
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate().map_err(AnalysisError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Whether files at this path will be analyzed at all
    #[must_use]
    pub fn accepts(&self, path: impl AsRef<Path>) -> bool {
        let language = Language::from_path(path);
        language.supports_ast() && self.language_enabled(language)
    }

    /// Analyze source code from a string; language is detected from `file_path`
    pub fn analyze_str(&self, content: &str, file_path: &str) -> Result<FileAnalysis> {
        let language = Language::from_path(file_path);
        self.analyze_with_language(content, file_path, language)
    }

    /// Analyze source code with explicit language
    pub fn analyze_with_language(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<FileAnalysis> {
        if !language.supports_ast() || !self.language_enabled(language) {
            return Err(AnalysisError::unsupported_language(language.as_str()));
        }

        if content.len() > self.config.max_file_bytes {
            return Err(AnalysisError::FileTooLarge {
                path: file_path.to_string(),
                bytes: content.len(),
                limit: self.config.max_file_bytes,
            });
        }

        let line_count = content.lines().count();
        if content.trim().is_empty() {
            return Ok(FileAnalysis {
                path: file_path.to_string(),
                language,
                units: Vec::new(),
                line_count,
            });
        }

        let mut analyzer = AstAnalyzer::new(self.config.clone(), language)?;
        let units = analyzer.analyze(content, file_path)?;

        log::debug!("{file_path}: {} units ({})", units.len(), language.as_str());

        Ok(FileAnalysis {
            path: file_path.to_string(),
            language,
            units,
            line_count,
        })
    }

    fn language_enabled(&self, language: Language) -> bool {
        self.config.supported_languages.is_empty()
            || self
                .config
                .supported_languages
                .iter()
                .any(|l| l == language.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_has_no_units() {
        let analyzer = SourceAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let analysis = analyzer.analyze_str("\n\n", "empty.py").unwrap();
        assert!(analysis.units.is_empty());
        assert_eq!(analysis.language, Language::Python);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let analyzer = SourceAnalyzer::new(AnalyzerConfig::default()).unwrap();
        assert!(!analyzer.accepts("README.md"));
        assert!(matches!(
            analyzer.analyze_str("hello", "README.md"),
            Err(AnalysisError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_language_filter() {
        let config = AnalyzerConfig {
            supported_languages: vec!["python".to_string()],
            ..AnalyzerConfig::default()
        };
        let analyzer = SourceAnalyzer::new(config).unwrap();
        assert!(analyzer.accepts("a.py"));
        assert!(!analyzer.accepts("a.rs"));
    }

    #[test]
    fn test_oversized_file_is_a_parse_failure() {
        let config = AnalyzerConfig {
            max_file_bytes: 8,
            ..AnalyzerConfig::default()
        };
        let analyzer = SourceAnalyzer::new(config).unwrap();
        let err = analyzer.analyze_str("fn main() {}", "main.rs").unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalyzerConfig {
            max_file_bytes: 0,
            ..AnalyzerConfig::default()
        };
        assert!(SourceAnalyzer::new(config).is_err());
    }
}
