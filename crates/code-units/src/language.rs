use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Programming language of an indexed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language is supported for AST parsing
    pub fn supports_ast(self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Unknown => Err(AnalysisError::unsupported_language(self.as_str())),
        }
    }

    /// Separator between a parent scope and a member in qualified names
    pub fn scope_separator(self) -> &'static str {
        match self {
            Language::Rust => "::",
            _ => ".",
        }
    }

    /// Receivers that refer to the enclosing type (`self.helper()`)
    pub fn is_self_receiver(self, receiver: &str) -> bool {
        match self {
            Language::Rust => matches!(receiver, "self" | "Self"),
            Language::Python => matches!(receiver, "self" | "cls"),
            Language::JavaScript | Language::TypeScript => receiver == "this",
            Language::Unknown => false,
        }
    }

    /// Whether a trimmed source line is a doc/comment line for this language
    pub fn is_doc_line(self, line: &str) -> bool {
        match self {
            Language::Rust => {
                line.starts_with("///") || line.starts_with("//!") || line.starts_with("/**")
            }
            Language::Python => line.starts_with('#'),
            Language::JavaScript | Language::TypeScript => {
                line.starts_with("//") || line.starts_with("/*") || line.starts_with('*')
            }
            Language::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("test.rs"), Language::Rust);
        assert_eq!(Language::from_path("src/main.py"), Language::Python);
        assert_eq!(Language::from_path("index.ts"), Language::TypeScript);
        assert_eq!(Language::from_path("no_extension"), Language::Unknown);
    }

    #[test]
    fn test_tree_sitter_language() {
        assert!(Language::Rust.tree_sitter_language().is_ok());
        assert!(Language::Python.tree_sitter_language().is_ok());
        assert!(Language::JavaScript.tree_sitter_language().is_ok());
        assert!(Language::TypeScript.tree_sitter_language().is_ok());
        assert!(Language::Unknown.tree_sitter_language().is_err());
    }

    #[test]
    fn test_self_receivers() {
        assert!(Language::Rust.is_self_receiver("self"));
        assert!(Language::Python.is_self_receiver("cls"));
        assert!(Language::TypeScript.is_self_receiver("this"));
        assert!(!Language::Python.is_self_receiver("this"));
    }

    #[test]
    fn test_doc_lines() {
        assert!(Language::Rust.is_doc_line("/// Applies the discount"));
        assert!(!Language::Rust.is_doc_line("let x = 1;"));
        assert!(Language::Python.is_doc_line("# refund policy"));
    }
}
