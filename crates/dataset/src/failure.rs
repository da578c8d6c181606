use repotrace_indexer::{FileFailure, IdentifierCollision};
use repotrace_reasoning::{SynthesisError, VerificationFailure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy used for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ParseError,
    IdentifierCollision,
    EvidenceCapacityExceeded,
    SynthesisTimeout,
    SynthesisCitationMiss,
    SynthesisError,
    VerificationFailure,
    PersistenceError,
    Cancelled,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::IdentifierCollision => "identifier_collision",
            Self::EvidenceCapacityExceeded => "evidence_capacity_exceeded",
            Self::SynthesisTimeout => "synthesis_timeout",
            Self::SynthesisCitationMiss => "synthesis_citation_miss",
            Self::SynthesisError => "synthesis_error",
            Self::VerificationFailure => "verification_failure",
            Self::PersistenceError => "persistence_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the record still goes ahead despite this diagnostic
    #[must_use]
    pub const fn is_advisory(self) -> bool {
        matches!(self, Self::ParseError | Self::EvidenceCapacityExceeded)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SynthesisError> for FailureKind {
    fn from(err: &SynthesisError) -> Self {
        match err {
            SynthesisError::Timeout { .. } => Self::SynthesisTimeout,
            SynthesisError::CitationMiss { .. } => Self::SynthesisCitationMiss,
            SynthesisError::Provider(_)
            | SynthesisError::MalformedDraft(_)
            | SynthesisError::EmptyEvidence => Self::SynthesisError,
        }
    }
}

/// One reported problem, scoped to a file or a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: FailureKind,

    /// File path, request subject, or offending identifier
    pub subject: String,

    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: FailureKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn parse(failure: &FileFailure) -> Self {
        let detail = match failure.line {
            Some(line) => format!("line {line}: {}", failure.message),
            None => failure.message.clone(),
        };
        Self::new(FailureKind::ParseError, failure.path.clone(), detail)
    }

    #[must_use]
    pub fn collision(collision: &IdentifierCollision) -> Self {
        Self::new(
            FailureKind::IdentifierCollision,
            collision.identifier.clone(),
            collision.to_string(),
        )
    }

    pub fn synthesis(subject: impl Into<String>, err: &SynthesisError) -> Self {
        Self::new(FailureKind::from(err), subject, err.to_string())
    }

    /// Verification diagnostics lead with the offending citation
    pub fn verification(subject: impl Into<String>, failure: &VerificationFailure) -> Self {
        let subject = subject.into();
        let detail = match failure.offending() {
            Some(offending) => format!("{offending}: {failure}"),
            None => failure.to_string(),
        };
        Self::new(FailureKind::VerificationFailure, subject, detail)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.detail)
    }
}
