//! # Repotrace Indexer
//!
//! Builds the repository-wide index of code units that every later stage
//! cites into.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware, sorted)
//!     │      └─> (path, contents)
//!     │
//!     ├──> Per-file analysis (parallel, bounded)
//!     │      ├─> unit drafts
//!     │      └─> parse failures → opaque leaf units
//!     │
//!     ├──> Merge (collision detection, overload suffixes)
//!     │
//!     └──> Edge resolution → SourceIndex (versioned, fingerprinted)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use repotrace_code_units::AnalyzerConfig;
//! use repotrace_indexer::{IndexBuilder, IndexStore};
//!
//! #[tokio::main]
//! async fn main() -> repotrace_indexer::Result<()> {
//!     let builder = IndexBuilder::new(AnalyzerConfig::default())?;
//!     let store = IndexStore::new();
//!     let index = store.rebuild(&builder, "/path/to/project").await?;
//!
//!     println!("v{}: {} units", index.version(), index.len());
//!     Ok(())
//! }
//! ```

mod builder;
mod error;
mod identifier;
mod index;
mod limits;
mod resolve;
mod scanner;
mod stats;
mod store;
mod unit;

pub use builder::{IndexBuilder, SourceInput};
pub use error::{IdentifierCollision, IndexerError, Result};
pub use identifier::{normalize_path, EdgeTarget, UnitId, EXTERN_PREFIX, MODULE_SYMBOL};
pub use index::SourceIndex;
pub use limits::index_concurrency_from_env;
pub use scanner::FileScanner;
pub use stats::{FileFailure, IndexStats};
pub use store::IndexStore;
pub use unit::{CodeUnit, Edge, SourceFile};
