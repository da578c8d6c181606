use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthesisError>;

/// Failure talking to the text-completion collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Why a generation request produced no draft
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("completion timed out after {secs}s ({attempts} attempts)")]
    Timeout { secs: u64, attempts: u32 },

    #[error("draft cites identifiers outside the evidence: {}", .ids.join(", "))]
    CitationMiss { ids: Vec<String> },

    #[error("provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed draft: {0}")]
    MalformedDraft(String),

    #[error("no evidence to ground the request")]
    EmptyEvidence,
}

/// Why a draft was rejected; every variant names the offending citation or point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("citation `{citation}` is not a known unit")]
    UnknownCitation { citation: String },

    #[error("citation `{citation}` is not part of the attached evidence")]
    NotInEvidence { citation: String },

    #[error("integration point `{point}` is neither the entry nor a boundary of the originating flow")]
    IntegrationPointOutsideFlow { point: String },

    #[error("integration point `{point}` was never shown to the generator")]
    IntegrationPointNotInEvidence { point: String },

    #[error("design proposal names no integration points")]
    MissingIntegrationPoints,

    #[error("evidence has no originating flow to check integration points against")]
    MissingOrigin,

    #[error("evidence span `{id}` no longer matches the indexed source")]
    StaleEvidence { id: String },

    #[error("reasoning trace cites nothing")]
    Uncited,
}

impl VerificationFailure {
    /// The identifier that triggered the rejection, if any
    #[must_use]
    pub fn offending(&self) -> Option<&str> {
        match self {
            Self::UnknownCitation { citation } | Self::NotInEvidence { citation } => {
                Some(citation)
            }
            Self::IntegrationPointOutsideFlow { point }
            | Self::IntegrationPointNotInEvidence { point } => Some(point),
            Self::StaleEvidence { id } => Some(id),
            Self::MissingIntegrationPoints | Self::MissingOrigin | Self::Uncited => None,
        }
    }
}
