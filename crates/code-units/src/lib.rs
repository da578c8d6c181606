//! # Repotrace Code Units
//!
//! AST-aware extraction of addressable code units from a single source file.
//!
//! ## Philosophy
//!
//! A code unit is the smallest piece of source that a generated answer can
//! cite: a function, a method, a class-like declaration, or (for files that
//! fail to parse) the whole module. Every unit carries exact byte-range
//! provenance so that later stages can check citations mechanically.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Tree-sitter Parsing → AST
//!     │      └─> syntax errors → ParseError (caller records an opaque unit)
//!     │
//!     └──> Unit Extraction
//!          ├─> Declarations (functions, methods, classes)
//!          ├─> Raw references (call sites, type/constructor uses)
//!          ├─> Branch markers (if/match/while/ternary conditions)
//!          └─> Doc comments (used for query relevance)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use repotrace_code_units::{AnalyzerConfig, SourceAnalyzer, UnitKind};
//!
//! let analyzer = SourceAnalyzer::new(AnalyzerConfig::default()).unwrap();
//!
//! let code = r#"
//! fn apply_discount(total: u64) -> u64 {
//!     if total > 100 { discounted(total) } else { total }
//! }
//! "#;
//!
//! let analysis = analyzer.analyze_str(code, "billing.rs").unwrap();
//! let unit = &analysis.units[0];
//! assert_eq!(unit.kind, UnitKind::Function);
//! assert_eq!(unit.branches.len(), 1);
//! ```

mod analyzer;
mod ast_analyzer;
mod config;
mod error;
mod language;
mod types;

pub use analyzer::SourceAnalyzer;
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Result};
pub use language::Language;
pub use types::{
    BranchKind, BranchMarker, ByteSpan, FileAnalysis, RawReference, ReferenceKind, UnitDraft,
    UnitKind,
};
