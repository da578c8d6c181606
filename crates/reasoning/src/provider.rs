use crate::error::ProviderError;
use crate::intent::Intent;
use async_trait::async_trait;
use repotrace_graph::{DecisionPoint, EvidenceSpan};

/// Everything the completion collaborator is allowed to see for one call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub intent: Intent,

    /// Instructions (citation rules, output shape)
    pub system: String,

    /// Rendered user message; enumerates only `evidence`
    pub prompt: String,

    /// Feature request, or the entry unit a question is about
    pub subject: String,

    pub evidence: Vec<EvidenceSpan>,

    /// Decision points of evidence units, verbatim
    pub decision_points: Vec<DecisionPoint>,

    /// Identifiers a design proposal may integrate at
    pub integration_candidates: Vec<String>,

    /// 1-based call number within this generation request
    pub attempt: u32,
}

/// External text-completion service; assumed slow and unreliable
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Raw draft text for `request`
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
