use crate::intent::Intent;
use crate::provider::CompletionRequest;
use repotrace_graph::{DecisionPoint, EvidenceSet, Flow};
use std::fmt::Write as _;

const CITATION_RULES: &str = "\
You answer strictly from the numbered evidence spans below. Each span is headed by its \
identifier. Cite a span by identifier only: either as a reasoning step {\"cite\": \"<id>\"} \
or inline as [cite:<id>]. Never paste source code as a substitute for a citation. Do not \
mention units that are not listed. If a span you need is missing, list it under \
\"need_evidence\" as {\"kind\": \"unit\" | \"callers_of\" | \"callees_of\", \"unit\": \"<id>\"} \
instead of guessing.";

const QA_SHAPE: &str = "\
Write one question about the business logic shown and answer it. Reply with one JSON \
object: {\"prompt\": string, \"answer\": string, \"reasoning\": [step], \"need_evidence\": [request]} \
where a step is {\"inference\": string} or {\"cite\": \"<id>\"}.";

const PROPOSAL_SHAPE: &str = "\
Propose a design for the requirement that fits the existing architecture. Reply with one \
JSON object: {\"prompt\": string, \"answer\": string, \"reasoning\": [step], \
\"integration_points\": [\"<id>\"], \"need_evidence\": [request]}. Integration points must \
be chosen from the listed candidates.";

/// Renders completion requests that expose only the evidence set's spans
pub struct PromptBuilder<'a> {
    intent: Intent,
    subject: &'a str,
    flow: Option<&'a Flow>,
}

impl<'a> PromptBuilder<'a> {
    #[must_use]
    pub const fn new(intent: Intent, subject: &'a str) -> Self {
        Self {
            intent,
            subject,
            flow: None,
        }
    }

    /// Decision points of `flow` are included for units present in the evidence
    #[must_use]
    pub const fn with_flow(mut self, flow: &'a Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn system(&self) -> String {
        let shape = match self.intent {
            Intent::Qa => QA_SHAPE,
            Intent::DesignProposal => PROPOSAL_SHAPE,
        };
        format!("{CITATION_RULES}\n\n{shape}")
    }

    pub fn build(&self, evidence: &EvidenceSet, attempt: u32, feedback: Option<&str>) -> CompletionRequest {
        let decision_points: Vec<DecisionPoint> = self
            .flow
            .map(|flow| {
                flow.decision_points
                    .iter()
                    .filter(|point| evidence.contains(&point.unit))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let integration_candidates = match self.intent {
            Intent::Qa => Vec::new(),
            Intent::DesignProposal => integration_candidates(evidence),
        };

        let prompt = self.render(evidence, &decision_points, &integration_candidates, feedback);

        CompletionRequest {
            intent: self.intent,
            system: self.system(),
            prompt,
            subject: self.subject.to_string(),
            evidence: evidence.spans().to_vec(),
            decision_points,
            integration_candidates,
            attempt,
        }
    }

    fn render(
        &self,
        evidence: &EvidenceSet,
        decision_points: &[DecisionPoint],
        candidates: &[String],
        feedback: Option<&str>,
    ) -> String {
        let mut out = String::new();
        match self.intent {
            Intent::Qa => {
                let _ = writeln!(out, "Subject: {}", self.subject);
            }
            Intent::DesignProposal => {
                let _ = writeln!(out, "Requirement: {}", self.subject.trim());
            }
        }

        let _ = writeln!(out, "\n## Evidence ({} spans)", evidence.len());
        for (i, span) in evidence.spans().iter().enumerate() {
            let _ = writeln!(
                out,
                "\n### [{}] {} ({}, lines {}-{})\n```\n{}\n```",
                i + 1,
                span.id,
                span.kind.as_str(),
                span.span.start_line,
                span.span.end_line,
                span.text
            );
        }

        if !decision_points.is_empty() {
            let _ = writeln!(out, "\n## Decision points");
            for point in decision_points {
                let _ = writeln!(
                    out,
                    "- {} ({}): `{}`",
                    point.unit,
                    point.kind.as_str(),
                    point.text
                );
            }
        }

        if !candidates.is_empty() {
            let _ = writeln!(out, "\n## Integration candidates");
            for candidate in candidates {
                let _ = writeln!(out, "- {candidate}");
            }
        }

        if let Some(feedback) = feedback {
            let _ = writeln!(out, "\n## Correction\n{feedback}");
        }
        out
    }
}

/// Entry first, then boundary units, then external symbols of the originating flow.
/// Units whose spans did not make it into the evidence are never offered.
fn integration_candidates(evidence: &EvidenceSet) -> Vec<String> {
    let Some(origin) = evidence.origin() else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    for unit in std::iter::once(&origin.entry).chain(&origin.boundary_units) {
        let rendered = unit.to_string();
        if evidence.contains(unit) && !candidates.contains(&rendered) {
            candidates.push(rendered);
        }
    }
    for name in &origin.external {
        if !candidates.contains(name) {
            candidates.push(name.clone());
        }
    }
    candidates
}
