use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure appending to the persistence collaborator
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("sink rejected the record: {0}")]
    Rejected(String),
}

/// Failure setting up a run; request-scoped problems are diagnostics, not errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}
