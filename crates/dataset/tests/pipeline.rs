mod support;

use pretty_assertions::assert_eq;
use repotrace_dataset::{
    DatasetEmitter, EmitConfig, FailureKind, GenerationTask, PersistenceError, Pipeline,
    PipelineConfig, RECORDS_FILE,
};
use repotrace_indexer::UnitId;
use repotrace_reasoning::{
    GenerationRecord, Intent, OfflineCompletionProvider, SynthesisConfig, SynthesisRequest,
    Synthesizer, Verifier,
};
use std::sync::Arc;
use support::{shop, FlakySink, HallucinatingProvider};
use tempfile::TempDir;

fn offline() -> Arc<Synthesizer> {
    Arc::new(Synthesizer::new(
        Arc::new(OfflineCompletionProvider::new()),
        SynthesisConfig::default(),
    ))
}

fn fast_retries() -> EmitConfig {
    EmitConfig {
        max_attempts: 3,
        backoff_ms: 1,
    }
}

fn config(questions_per_flow: usize) -> PipelineConfig {
    PipelineConfig {
        workers: 4,
        max_flows: 8,
        questions_per_flow,
        proposals: 2,
    }
}

#[tokio::test]
async fn offline_run_emits_only_grounded_records() {
    let snapshot = shop().await;
    let dir = TempDir::new().unwrap();
    let emitter = Arc::new(DatasetEmitter::jsonl(dir.path(), fast_retries()).await.unwrap());
    let pipeline = Pipeline::new(Arc::clone(&snapshot), offline(), Arc::clone(&emitter), config(2)).unwrap();

    let features = vec!["Refuse checkout for blocked customers".to_string()];
    let summary = pipeline.run(&features).await;

    assert_eq!(summary.requests, 3);
    assert_eq!(summary.records_emitted, 3);
    assert_eq!(emitter.emitted(), 3);
    assert!(summary.is_success());
    assert_eq!(summary.dropped_requests(), 0);

    let text = std::fs::read_to_string(dir.path().join(RECORDS_FILE)).unwrap();
    let records: Vec<GenerationRecord> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 3);

    for record in &records {
        for cited in record.citations() {
            let id: UnitId = cited.parse().unwrap();
            assert!(record.evidence.contains(&id), "{cited} outside evidence");
        }
        assert_eq!(record.metadata.index_fingerprint, snapshot.index().fingerprint());
    }
    let proposals: Vec<&GenerationRecord> = records
        .iter()
        .filter(|r| r.intent == Intent::DesignProposal)
        .collect();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].prompt, "Refuse checkout for blocked customers");
}

#[tokio::test]
async fn plan_covers_entry_then_decision_units() {
    let snapshot = shop().await;
    let emitter = Arc::new(DatasetEmitter::new(Box::new(FlakySink::default()), fast_retries()));
    let pipeline = Pipeline::new(snapshot, offline(), emitter, config(3)).unwrap();

    let (tasks, diagnostics) = pipeline.plan(&["quantum teleportation".to_string()]);

    let focuses: Vec<String> = tasks
        .iter()
        .filter_map(|task| match task {
            GenerationTask::Question { focus, .. } => Some(focus.to_string()),
            GenerationTask::Proposal { .. } => None,
        })
        .collect();
    assert_eq!(
        focuses,
        vec![
            "shop/cart.py::Cart.checkout".to_string(),
            "shop/payments.py::charge".to_string(),
        ]
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].subject, "quantum teleportation");
}

#[tokio::test]
async fn hallucinated_citations_never_reach_the_sink() {
    let snapshot = shop().await;
    let sink = FlakySink::default();
    let emitter = Arc::new(DatasetEmitter::new(Box::new(sink.clone()), fast_retries()));
    let synthesizer = Arc::new(Synthesizer::new(
        Arc::new(HallucinatingProvider),
        SynthesisConfig::default(),
    ));
    let pipeline = Pipeline::new(snapshot, synthesizer, emitter, config(1)).unwrap();

    let summary = pipeline
        .run(&["Refuse checkout for blocked customers".to_string()])
        .await;

    assert_eq!(summary.records_emitted, 0);
    assert_eq!(summary.failure_count(FailureKind::SynthesisCitationMiss), 2);
    assert!(!summary.is_success());
    assert!(sink.lines().is_empty());
    assert!(summary
        .diagnostics
        .iter()
        .all(|d| d.detail.contains("shop/ledger.py::credit")));
}

#[tokio::test]
async fn cancelled_run_emits_nothing() {
    let snapshot = shop().await;
    let sink = FlakySink::default();
    let emitter = Arc::new(DatasetEmitter::new(Box::new(sink.clone()), fast_retries()));
    let pipeline = Pipeline::new(snapshot, offline(), emitter, config(2)).unwrap();

    let handle = pipeline.cancel_handle();
    handle.cancel();
    assert!(handle.is_cancelled());

    let summary = pipeline.run(&[]).await;
    assert_eq!(summary.records_emitted, 0);
    assert_eq!(summary.failure_count(FailureKind::Cancelled), summary.requests);
    assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn invalid_pipeline_config_is_rejected() {
    let snapshot = shop().await;
    let emitter = Arc::new(DatasetEmitter::new(Box::new(FlakySink::default()), fast_retries()));
    let bad = PipelineConfig {
        workers: 0,
        ..config(1)
    };
    assert!(Pipeline::new(snapshot, offline(), emitter, bad).is_err());
}

async fn verified_record() -> repotrace_reasoning::VerifiedRecord {
    let snapshot = shop().await;
    let flow = snapshot
        .flow(&"shop/cart.py::Cart.checkout".parse().unwrap())
        .unwrap();
    let evidence = snapshot.selector().select_for_flow(&flow);
    let record = offline()
        .synthesize(&snapshot, SynthesisRequest::qa(flow, evidence))
        .await
        .unwrap();
    Verifier::new(snapshot.index()).verify(record).unwrap()
}

#[tokio::test]
async fn emitter_retries_transient_sink_failures() {
    let record = verified_record().await;
    let sink = FlakySink::failing(2);
    let emitter = DatasetEmitter::new(Box::new(sink.clone()), fast_retries());

    emitter.emit(&record).await.unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with('\n'));
    let back: GenerationRecord = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(&back, record.record());
}

#[tokio::test]
async fn emitter_gives_up_after_bounded_attempts() {
    let record = verified_record().await;
    let sink = FlakySink::failing(10);
    let emitter = DatasetEmitter::new(Box::new(sink.clone()), fast_retries());

    let err = emitter.emit(&record).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Exhausted { attempts: 3, .. }));
    assert!(sink.lines().is_empty());
    assert_eq!(emitter.emitted(), 0);
}
