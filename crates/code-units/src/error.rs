use thiserror::Error;

/// Result type for unit extraction
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while turning a source file into code units
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The source contains syntax errors; the file is not trusted for edges
    #[error("Parse error in {path} at line {line}: {message}")]
    ParseError {
        path: String,
        line: usize,
        message: String,
    },

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File exceeds the configured size limit
    #[error("File too large: {path} ({bytes} bytes > {limit})")]
    FileTooLarge {
        path: String,
        bytes: usize,
        limit: usize,
    },

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl AnalysisError {
    /// Create a parse error
    pub fn parse(path: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// Whether the failure is local to the file's syntax (recorded, not fatal)
    #[must_use]
    pub const fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseError { .. } | Self::FileTooLarge { .. })
    }
}
