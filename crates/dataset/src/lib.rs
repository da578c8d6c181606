//! # Repotrace Dataset
//!
//! Runs generation requests over a bounded worker pool and appends the verified
//! results to the dataset.
//!
//! ```text
//! AnalysisSnapshot ──> Pipeline::plan ──> [GenerationTask]
//!                                              │  (Semaphore-bounded JoinSet)
//!                                              ▼
//!                  Evidence ─> Synthesizer ─> Verifier ─> DatasetEmitter ─> RecordSink
//!                                              │
//!                                              ▼
//!                                RunSummary (failures by kind) ─> RunManifest
//! ```
//!
//! Request-scoped failures become [`Diagnostic`]s; the run itself only fails when
//! indexing does.

mod config;
mod emitter;
mod error;
mod failure;
mod manifest;
mod pipeline;
mod sink;
mod summary;

pub use config::{PipelineConfig, ENV_WORKERS};
pub use emitter::{DatasetEmitter, EmitConfig};
pub use error::{PersistenceError, PipelineError, Result};
pub use failure::{Diagnostic, FailureKind};
pub use manifest::{RunManifest, MANIFEST_FILE, RECORDS_FILE};
pub use pipeline::{CancelHandle, GenerationTask, Pipeline};
pub use sink::{JsonlSink, RecordSink};
pub use summary::RunSummary;
