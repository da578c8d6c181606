use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

/// Two inputs that resolved to the same identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierCollision {
    /// The contested identifier (a unit id or a normalized file path)
    pub identifier: String,

    /// Path of the input that claimed it first (in sorted input order)
    pub first: String,

    /// Path of the input that claimed it again
    pub second: String,
}

impl fmt::Display for IdentifierCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` is defined by both {} and {}",
            self.identifier, self.first, self.second
        )
    }
}

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Analysis error: {0}")]
    AnalysisError(#[from] repotrace_code_units::AnalysisError),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Invalid unit identifier: {0}")]
    InvalidIdentifier(String),

    #[error("identifier collision: {} ({} total)", .0[0], .0.len())]
    IdentifierCollision(Vec<IdentifierCollision>),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Whether this error must abort the whole run
    #[must_use]
    pub const fn is_collision(&self) -> bool {
        matches!(self, Self::IdentifierCollision(_))
    }
}
