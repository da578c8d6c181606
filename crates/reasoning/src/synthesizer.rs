use crate::config::SynthesisConfig;
use crate::draft::{parse_draft, Draft};
use crate::error::{Result, SynthesisError};
use crate::intent::Intent;
use crate::prompt::PromptBuilder;
use crate::provider::CompletionProvider;
use crate::record::{GenerationRecord, RecordMetadata};
use repotrace_graph::{
    AnalysisSnapshot, EvidenceSelector, EvidenceSet, ExpansionRequest, Flow, GraphError,
};
use repotrace_indexer::UnitId;
use std::collections::HashSet;
use std::sync::Arc;

/// One generation request
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub intent: Intent,

    /// Feature request for proposals; the entry identifier for questions
    pub subject: String,

    pub evidence: EvidenceSet,

    /// Flow the evidence was selected from, for decision points
    pub flow: Option<Arc<Flow>>,
}

impl SynthesisRequest {
    /// Question about the business rule rooted at `flow.entry`
    #[must_use]
    pub fn qa(flow: Arc<Flow>, evidence: EvidenceSet) -> Self {
        Self {
            intent: Intent::Qa,
            subject: flow.entry.to_string(),
            evidence,
            flow: Some(flow),
        }
    }

    #[must_use]
    pub fn design_proposal(
        requirement: impl Into<String>,
        evidence: EvidenceSet,
        flow: Option<Arc<Flow>>,
    ) -> Self {
        Self {
            intent: Intent::DesignProposal,
            subject: requirement.into(),
            evidence,
            flow,
        }
    }
}

/// Drives the completion collaborator until it returns a draft whose citations
/// all fall inside the evidence set, or the request's retry budget runs out
pub struct Synthesizer {
    provider: Arc<dyn CompletionProvider>,
    config: SynthesisConfig,
}

/// Per-request bookkeeping
struct Attempts {
    made: u32,

    /// Timeouts, provider errors and malformed drafts
    retries_left: u32,

    /// Regenerations after a citation miss, kept apart so transient failures
    /// never use up the expansion a miss is owed
    misses_left: u32,
    expanded: HashSet<String>,
    expansions: Vec<UnitId>,
}

impl Attempts {
    /// Spend one retry, or hand back `err` when none are left
    fn retry_or(&mut self, err: SynthesisError) -> Result<()> {
        if self.retries_left == 0 {
            return Err(err);
        }
        self.retries_left -= 1;
        log::info!("Retrying synthesis after: {err}");
        Ok(())
    }
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: SynthesisConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    #[must_use]
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Produce a draft record for `request`.
    ///
    /// Each completion call is bounded by `timeout_secs`; timeouts, provider errors and
    /// malformed drafts draw on one retry budget. A draft citing identifiers
    /// outside the evidence triggers one expansion per missing identifier and a
    /// regeneration; citing the same identifier again after its expansion fails the
    /// request with [`SynthesisError::CitationMiss`]. Citation misses have their own
    /// budget of the same size. `need_evidence` requests are
    /// serviced while expansion rounds remain and do not consume retries.
    pub async fn synthesize(
        &self,
        snapshot: &AnalysisSnapshot,
        request: SynthesisRequest,
    ) -> Result<GenerationRecord> {
        let SynthesisRequest {
            intent,
            subject,
            mut evidence,
            flow,
        } = request;
        if evidence.is_empty() {
            return Err(SynthesisError::EmptyEvidence);
        }

        let selector = snapshot.selector();
        let mut builder = PromptBuilder::new(intent, &subject);
        if let Some(flow) = flow.as_deref() {
            builder = builder.with_flow(flow);
        }

        let mut state = Attempts {
            made: 0,
            retries_left: self.config.max_retries,
            misses_left: self.config.max_retries,
            expanded: HashSet::new(),
            expansions: Vec::new(),
        };
        let mut feedback: Option<String> = None;

        loop {
            state.made += 1;
            let call = builder.build(&evidence, state.made, feedback.as_deref());

            let raw = match tokio::time::timeout(self.config.timeout(), self.provider.complete(&call)).await {
                Err(_) => {
                    let err = SynthesisError::Timeout {
                        secs: self.config.timeout_secs,
                        attempts: state.made,
                    };
                    state.retry_or(err)?;
                    continue;
                }
                Ok(Err(err)) => {
                    state.retry_or(SynthesisError::Provider(err))?;
                    continue;
                }
                Ok(Ok(raw)) => raw,
            };

            let draft = match parse_draft(&raw) {
                Ok(draft) => draft,
                Err(err) => {
                    state.retry_or(err)?;
                    feedback = Some(
                        "The previous reply was not a JSON object in the requested shape."
                            .to_string(),
                    );
                    continue;
                }
            };

            if !draft.need_evidence.is_empty() && evidence.depth() < evidence.max_depth() {
                let added = service_requests(&selector, &mut evidence, &draft.need_evidence);
                log::debug!(
                    "Serviced {} evidence requests for {subject}, +{} spans",
                    draft.need_evidence.len(),
                    added.len()
                );
                state.expansions.extend(added);
                feedback = None;
                continue;
            }
            if draft.answer.is_empty() {
                state.retry_or(SynthesisError::MalformedDraft("draft has no answer".to_string()))?;
                continue;
            }

            let missing: Vec<String> = draft
                .citations()
                .into_iter()
                .filter(|cited| !cites_evidence(&evidence, cited))
                .collect();
            if missing.is_empty() {
                return Ok(self.record(intent, &subject, draft, evidence, snapshot, state));
            }

            let repeated = missing.iter().any(|id| state.expanded.contains(id));
            if repeated || state.misses_left == 0 {
                log::warn!(
                    "Synthesis citation miss for {subject}: {} (attempt {})",
                    missing.join(", "),
                    state.made
                );
                return Err(SynthesisError::CitationMiss { ids: missing });
            }
            state.misses_left -= 1;

            for cited in &missing {
                state.expanded.insert(cited.clone());
                let Ok(id) = cited.parse::<UnitId>() else {
                    log::info!("Cited identifier `{cited}` is not a unit id; not expanding");
                    continue;
                };
                match selector.expand(&mut evidence, &ExpansionRequest::Unit(id.clone())) {
                    Ok(added) => state.expansions.extend(added),
                    Err(err) => log::info!("Expansion for `{cited}` failed: {err}"),
                }
            }
            log::info!(
                "Retrying synthesis for {subject} after citation miss on {}",
                missing.join(", ")
            );
            feedback = Some(format!(
                "The previous draft cited identifiers that are not in the evidence: {}. Cite only listed spans.",
                missing.join(", ")
            ));
        }
    }

    fn record(
        &self,
        intent: Intent,
        subject: &str,
        draft: Draft,
        evidence: EvidenceSet,
        snapshot: &AnalysisSnapshot,
        state: Attempts,
    ) -> GenerationRecord {
        let prompt = if draft.prompt.is_empty() {
            subject.trim().to_string()
        } else {
            draft.prompt
        };
        let metadata = RecordMetadata {
            index_version: snapshot.version(),
            index_fingerprint: snapshot.index().fingerprint().to_string(),
            flow_entry: evidence.origin().map(|origin| origin.entry.clone()),
            attempts: state.made,
            expansions: state.expansions,
            provider: self.provider.name().to_string(),
        };

        GenerationRecord {
            intent,
            prompt,
            answer: draft.answer,
            reasoning: draft.reasoning,
            integration_points: draft.integration_points,
            evidence,
            metadata,
        }
    }
}

fn cites_evidence(evidence: &EvidenceSet, cited: &str) -> bool {
    cited
        .parse::<UnitId>()
        .is_ok_and(|id| evidence.contains(&id))
}

/// Apply the collaborator's own expansion requests; returns the identifiers added
fn service_requests(
    selector: &EvidenceSelector<'_>,
    evidence: &mut EvidenceSet,
    requests: &[ExpansionRequest],
) -> Vec<UnitId> {
    let mut added = Vec::new();
    for request in requests {
        match selector.expand(evidence, request) {
            Ok(ids) => added.extend(ids),
            Err(GraphError::ExpansionDepthExhausted { .. }) => break,
            Err(err) => log::debug!("Ignoring evidence request {request:?}: {err}"),
        }
    }
    added
}
