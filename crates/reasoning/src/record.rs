use crate::intent::Intent;
use repotrace_graph::EvidenceSet;
use repotrace_indexer::UnitId;
use serde::{Deserialize, Serialize};

/// Marker for inline citations inside free text: `[cite:<id>]`
pub const INLINE_CITE_OPEN: &str = "[cite:";

/// One step of a reasoning trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ReasoningStep {
    /// Natural-language inference; may carry inline `[cite:<id>]` markers
    Inference { text: String },

    /// Citation of one evidence span by identifier
    Citation {
        unit: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

impl ReasoningStep {
    pub fn inference(text: impl Into<String>) -> Self {
        Self::Inference { text: text.into() }
    }

    pub fn cite(unit: &UnitId) -> Self {
        Self::Citation {
            unit: unit.to_string(),
            note: None,
        }
    }
}

/// Provenance of a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub index_version: u64,
    pub index_fingerprint: String,

    /// Entry of the flow the evidence came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_entry: Option<UnitId>,

    /// Completion calls made for this record
    pub attempts: u32,

    /// Identifiers requested and added mid-generation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expansions: Vec<UnitId>,

    pub provider: String,
}

/// The unit emitted to the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub intent: Intent,

    /// Question or requirement
    pub prompt: String,

    /// Answer or proposal
    pub answer: String,

    pub reasoning: Vec<ReasoningStep>,

    /// Units a design proposal plans to change
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integration_points: Vec<String>,

    /// The only source a grader checks citations against
    pub evidence: EvidenceSet,

    pub metadata: RecordMetadata,
}

impl GenerationRecord {
    /// Every cited identifier, as written: citation steps, then inline markers in
    /// inference steps, then inline markers in the answer. Duplicates removed.
    #[must_use]
    pub fn citations(&self) -> Vec<String> {
        collect_citations(&self.reasoning, &self.answer)
    }
}

pub(crate) fn collect_citations(reasoning: &[ReasoningStep], answer: &str) -> Vec<String> {
    let mut cited: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        let raw = raw.trim();
        if !raw.is_empty() && !cited.iter().any(|c| c == raw) {
            cited.push(raw.to_string());
        }
    };

    for step in reasoning {
        if let ReasoningStep::Citation { unit, .. } = step {
            push(unit);
        }
    }
    for step in reasoning {
        if let ReasoningStep::Inference { text } = step {
            for marker in inline_citations(text) {
                push(marker);
            }
        }
    }
    for marker in inline_citations(answer) {
        push(marker);
    }
    cited
}

/// Identifiers inside `[cite:<id>]` markers, in order of appearance
pub fn inline_citations(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(INLINE_CITE_OPEN) {
        let after = &rest[start + INLINE_CITE_OPEN.len()..];
        let Some(end) = after.find(']') else {
            break;
        };
        found.push(after[..end].trim());
        rest = &after[end + 1..];
    }
    found
}
