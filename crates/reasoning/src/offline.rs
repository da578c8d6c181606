use crate::error::ProviderError;
use crate::intent::Intent;
use crate::provider::{CompletionProvider, CompletionRequest};
use async_trait::async_trait;
use repotrace_graph::EvidenceSpan;
use serde_json::json;

/// Deterministic drafts built from the evidence alone.
///
/// Lets the whole pipeline run without a model: it describes the subject unit,
/// cites every span in order, quotes decision conditions through citations and,
/// for design proposals, integrates at the first offered candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCompletionProvider;

impl OfflineCompletionProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn qa_draft(request: &CompletionRequest) -> serde_json::Value {
        let Some(subject) = subject_span(request) else {
            return json!({});
        };
        let name = subject.id.name();
        let prompt = if request.decision_points.is_empty() {
            format!("What does `{name}` in `{}` do?", subject.id.path())
        } else {
            format!(
                "Which conditions decide the outcome of `{name}` in `{}`?",
                subject.id.path()
            )
        };

        let mut reasoning = Vec::new();
        for span in &request.evidence {
            reasoning.push(json!({ "cite": span.id.to_string() }));
            reasoning.push(json!({ "inference": describe(span) }));
        }
        for point in &request.decision_points {
            reasoning.push(json!({
                "inference": format!(
                    "`{}` takes a {} branch on `{}` [cite:{}]",
                    point.unit.name(),
                    point.kind.as_str(),
                    point.text,
                    point.unit
                )
            }));
        }

        let others: Vec<String> = request
            .evidence
            .iter()
            .filter(|span| span.id != subject.id)
            .map(|span| format!("`{}`", span.id.name()))
            .collect();
        let mut answer = format!("`{name}` [cite:{}]", subject.id);
        if others.is_empty() {
            answer.push_str(" runs without delegating to other indexed units");
        } else {
            answer.push_str(&format!(" delegates to {}", others.join(", ")));
        }
        if !request.decision_points.is_empty() {
            let conditions: Vec<String> = request
                .decision_points
                .iter()
                .map(|point| format!("`{}`", point.text))
                .collect();
            answer.push_str(&format!(", and its path depends on {}", conditions.join(", ")));
        }
        answer.push('.');

        json!({ "prompt": prompt, "answer": answer, "reasoning": reasoning })
    }

    fn proposal_draft(request: &CompletionRequest) -> serde_json::Value {
        let anchor = request
            .integration_candidates
            .iter()
            .find(|candidate| request.evidence.iter().any(|span| span.id.to_string() == **candidate))
            .or_else(|| request.integration_candidates.first());
        let Some(anchor) = anchor else {
            return json!({});
        };

        let mut reasoning = vec![json!({
            "inference": format!("The requirement is: {}", request.subject.trim())
        })];
        for span in &request.evidence {
            reasoning.push(json!({ "cite": span.id.to_string() }));
            reasoning.push(json!({ "inference": describe(span) }));
        }
        reasoning.push(json!({
            "inference": format!("`{anchor}` is where the existing flow starts, so the change hooks in there")
        }));

        json!({
            "prompt": request.subject.trim(),
            "answer": format!(
                "Extend `{anchor}` to cover the new requirement, keeping its current callees unchanged and adding the new branch before they run."
            ),
            "reasoning": reasoning,
            "integration_points": [anchor],
        })
    }
}

#[async_trait]
impl CompletionProvider for OfflineCompletionProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        if request.evidence.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no evidence to draft from".to_string(),
            ));
        }
        let draft = match request.intent {
            Intent::Qa => Self::qa_draft(request),
            Intent::DesignProposal => Self::proposal_draft(request),
        };
        Ok(draft.to_string())
    }
}

fn subject_span(request: &CompletionRequest) -> Option<&EvidenceSpan> {
    request
        .evidence
        .iter()
        .find(|span| span.id.to_string() == request.subject)
        .or_else(|| request.evidence.first())
}

fn describe(span: &EvidenceSpan) -> String {
    let first_line = span.text.lines().next().unwrap_or_default().trim();
    format!(
        "`{}` is a {} at lines {}-{} declared as `{}`",
        span.id.name(),
        span.kind.as_str(),
        span.span.start_line,
        span.span.end_line,
        first_line
    )
}
