use crate::config::PipelineConfig;
use crate::emitter::DatasetEmitter;
use crate::error::{PipelineError, Result};
use crate::failure::{Diagnostic, FailureKind};
use crate::summary::RunSummary;
use repotrace_graph::{AnalysisSnapshot, Flow};
use repotrace_indexer::UnitId;
use repotrace_reasoning::{SynthesisRequest, Synthesizer, Verifier};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// One independent generation request
#[derive(Debug, Clone)]
pub enum GenerationTask {
    /// Question about `flow`, focused on one of its units
    Question { flow: Arc<Flow>, focus: UnitId },

    /// Design proposal for `requirement`, anchored in `flow`
    Proposal {
        requirement: String,
        flow: Arc<Flow>,
        seed: UnitId,
    },
}

impl GenerationTask {
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Question { focus, .. } => focus.to_string(),
            Self::Proposal {
                requirement, flow, ..
            } => format!("{requirement} @ {}", flow.entry),
        }
    }
}

/// Stops queued and in-flight requests; records already emitted stay emitted
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[derive(Default)]
struct Outcome {
    emitted: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            emitted: false,
            diagnostics: vec![diagnostic],
        }
    }

    fn cancelled(subject: String) -> Self {
        Self::failed(Diagnostic::new(
            FailureKind::Cancelled,
            subject,
            "cancelled before emission",
        ))
    }
}

struct Shared {
    snapshot: Arc<AnalysisSnapshot>,
    synthesizer: Arc<Synthesizer>,
    emitter: Arc<DatasetEmitter>,
}

/// Flow → Evidence → Synthesize → Verify → Emit, over a bounded worker pool
pub struct Pipeline {
    shared: Arc<Shared>,
    config: PipelineConfig,
    cancel: Arc<watch::Sender<bool>>,
}

impl Pipeline {
    pub fn new(
        snapshot: Arc<AnalysisSnapshot>,
        synthesizer: Arc<Synthesizer>,
        emitter: Arc<DatasetEmitter>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        let (tx, _rx) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                snapshot,
                synthesizer,
                emitter,
            }),
            config,
            cancel: Arc::new(tx),
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Requests for this run: questions over discovered flows, then proposals per
    /// feature. Features nothing in the index matches come back as diagnostics.
    pub fn plan(&self, features: &[String]) -> (Vec<GenerationTask>, Vec<Diagnostic>) {
        let snapshot = &self.shared.snapshot;
        let flows = snapshot.discover(self.config.max_flows);
        let mut tasks = Vec::new();
        let mut diagnostics = Vec::new();

        for flow in &flows {
            let mut focuses = vec![flow.entry.clone()];
            for point in &flow.decision_points {
                if !focuses.contains(&point.unit) {
                    focuses.push(point.unit.clone());
                }
            }
            for focus in focuses.into_iter().take(self.config.questions_per_flow) {
                tasks.push(GenerationTask::Question {
                    flow: Arc::clone(flow),
                    focus,
                });
            }
        }

        let selector = snapshot.selector();
        for feature in features.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
            let seeds = selector.suggest_seeds(feature, self.config.proposals.max(1) * 2);
            let mut anchored = HashSet::new();
            let mut planned = 0;
            for seed in seeds {
                if planned >= self.config.proposals {
                    break;
                }
                let flow = match flows.iter().find(|flow| flow.contains(&seed)) {
                    Some(flow) => Arc::clone(flow),
                    None => match snapshot.flow(&seed) {
                        Ok(flow) => flow,
                        Err(err) => {
                            log::debug!("No flow for seed {seed}: {err}");
                            continue;
                        }
                    },
                };
                if !anchored.insert(flow.entry.clone()) {
                    continue;
                }
                tasks.push(GenerationTask::Proposal {
                    requirement: feature.to_string(),
                    flow,
                    seed,
                });
                planned += 1;
            }
            if planned == 0 && self.config.proposals > 0 {
                diagnostics.push(Diagnostic::new(
                    FailureKind::SynthesisError,
                    feature,
                    "no indexed unit matches the feature request",
                ));
            }
        }

        (tasks, diagnostics)
    }

    /// Run every planned request; never fails as a whole
    pub async fn run(&self, features: &[String]) -> RunSummary {
        let mut summary = RunSummary::from_index(self.shared.snapshot.index());
        let (tasks, planning) = self.plan(features);
        summary.requests = tasks.len() + planning.len();
        for diagnostic in planning {
            summary.record(diagnostic);
        }
        log::info!(
            "Running {} generation requests on {} workers",
            tasks.len(),
            self.config.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut join = JoinSet::new();
        for task in tasks {
            let shared = Arc::clone(&self.shared);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.subscribe();
            join.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Outcome::cancelled(task.subject());
                };
                shared.execute(task, cancel).await
            });
        }

        while let Some(joined) = join.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.emitted {
                        summary.records_emitted += 1;
                    }
                    for diagnostic in outcome.diagnostics {
                        summary.record(diagnostic);
                    }
                }
                Err(err) => {
                    let kind = if err.is_cancelled() {
                        FailureKind::Cancelled
                    } else {
                        FailureKind::SynthesisError
                    };
                    log::warn!("Generation worker failed: {err}");
                    summary.record(Diagnostic::new(kind, "worker", err.to_string()));
                }
            }
        }

        log::info!(
            "Generation finished: {} emitted, {} dropped",
            summary.records_emitted,
            summary.dropped_requests()
        );
        summary
    }
}

impl Shared {
    fn request(&self, task: GenerationTask) -> SynthesisRequest {
        let selector = self.snapshot.selector();
        match task {
            GenerationTask::Question { flow, focus } => {
                let evidence = selector.select_for_flow(&flow);
                SynthesisRequest {
                    subject: focus.to_string(),
                    ..SynthesisRequest::qa(flow, evidence)
                }
            }
            GenerationTask::Proposal {
                requirement,
                flow,
                seed,
            } => {
                let mut seeds = vec![flow.entry.clone()];
                if seed != flow.entry {
                    seeds.push(seed);
                }
                let mut evidence = selector.select_for_query(&requirement, &seeds);
                evidence.set_origin(flow.origin());
                SynthesisRequest::design_proposal(requirement, evidence, Some(flow))
            }
        }
    }

    async fn execute(&self, task: GenerationTask, mut cancel: watch::Receiver<bool>) -> Outcome {
        let subject = task.subject();
        if *cancel.borrow() {
            return Outcome::cancelled(subject);
        }

        let mut outcome = Outcome::default();
        let request = self.request(task);
        if request.evidence.dropped() > 0 {
            outcome.diagnostics.push(Diagnostic::new(
                FailureKind::EvidenceCapacityExceeded,
                subject.clone(),
                format!(
                    "kept {} spans, dropped {}",
                    request.evidence.len(),
                    request.evidence.dropped()
                ),
            ));
        }

        let synthesized = tokio::select! {
            biased;
            () = cancelled(&mut cancel) => {
                outcome.diagnostics.push(Diagnostic::new(
                    FailureKind::Cancelled,
                    subject.clone(),
                    "cancelled during synthesis",
                ));
                return outcome;
            }
            result = self.synthesizer.synthesize(&self.snapshot, request) => result,
        };

        let record = match synthesized {
            Ok(record) => record,
            Err(err) => {
                log::warn!("Synthesis failed for {subject}: {err}");
                outcome.diagnostics.push(Diagnostic::synthesis(subject, &err));
                return outcome;
            }
        };

        let verified = match Verifier::new(self.snapshot.index()).verify(record) {
            Ok(verified) => verified,
            Err(failure) => {
                log::warn!("Verification rejected {subject}: {failure}");
                outcome
                    .diagnostics
                    .push(Diagnostic::verification(subject, &failure));
                return outcome;
            }
        };

        // Last point where cancellation is honored; emission itself is not interrupted.
        if *cancel.borrow() {
            outcome.diagnostics.push(Diagnostic::new(
                FailureKind::Cancelled,
                subject,
                "cancelled before emission",
            ));
            return outcome;
        }

        match self.emitter.emit(&verified).await {
            Ok(()) => outcome.emitted = true,
            Err(err) => {
                log::warn!("Dropping record for {subject}: {err}");
                outcome.diagnostics.push(Diagnostic::new(
                    FailureKind::PersistenceError,
                    subject,
                    err.to_string(),
                ));
            }
        }
        outcome
    }
}

/// Resolves once cancellation is requested; never if the handle is gone
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
