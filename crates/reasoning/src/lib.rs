//! # Repotrace Reasoning
//!
//! Turns an evidence set into a grounded generation record and checks it.
//!
//! ```text
//! EvidenceSet ──> PromptBuilder ──> CompletionProvider (timeout)
//!      ▲                                   │
//!      │ expand (one per missing id)       ▼
//!      └──────────── citation miss ◄── parse_draft
//!                                          │
//!                                          ▼
//!                               GenerationRecord ──> Verifier ──> VerifiedRecord
//! ```
//!
//! The collaborator only ever sees the spans of the evidence set. Every
//! identifier it cites must resolve to one of them, otherwise the request fails
//! after a single expansion round per identifier.

mod config;
mod draft;
mod error;
mod http;
mod intent;
mod offline;
mod prompt;
mod provider;
mod record;
mod synthesizer;
mod verifier;

pub use config::{
    ProviderKind, SynthesisConfig, ENV_LLM_API_KEY, ENV_LLM_MODEL, ENV_LLM_URL, MAX_RETRIES_LIMIT,
};
pub use draft::{parse_draft, Draft};
pub use error::{ProviderError, Result, SynthesisError, VerificationFailure};
pub use http::HttpCompletionProvider;
pub use intent::Intent;
pub use offline::OfflineCompletionProvider;
pub use prompt::PromptBuilder;
pub use provider::{CompletionProvider, CompletionRequest};
pub use record::{inline_citations, GenerationRecord, ReasoningStep, RecordMetadata};
pub use synthesizer::{SynthesisRequest, Synthesizer};
pub use verifier::{VerifiedRecord, Verifier};

use std::sync::Arc;

/// Provider selected by `config.provider`
pub fn provider_from_config(
    config: &SynthesisConfig,
) -> std::result::Result<Arc<dyn CompletionProvider>, ProviderError> {
    Ok(match config.provider {
        ProviderKind::Offline => Arc::new(OfflineCompletionProvider::new()),
        ProviderKind::Http => Arc::new(HttpCompletionProvider::new(config)?),
    })
}
