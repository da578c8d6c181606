mod support;

use pretty_assertions::assert_eq;
use repotrace_graph::{EvidenceConfig, EvidenceSet};
use repotrace_reasoning::{
    GenerationRecord, Intent, PromptBuilder, ReasoningStep, RecordMetadata, VerificationFailure,
    Verifier,
};
use support::{id, shop, snapshot_of, CART, PAYMENTS};

fn record(intent: Intent, evidence: EvidenceSet, reasoning: Vec<ReasoningStep>) -> GenerationRecord {
    GenerationRecord {
        intent,
        prompt: "When is the card charged?".to_string(),
        answer: "After the total check.".to_string(),
        reasoning,
        integration_points: Vec::new(),
        evidence,
        metadata: RecordMetadata::default(),
    }
}

fn cite(raw: &str) -> ReasoningStep {
    ReasoningStep::Citation {
        unit: raw.to_string(),
        note: None,
    }
}

#[tokio::test]
async fn grounded_record_passes() {
    let snapshot = shop().await;
    let flow = snapshot.flow(&id("shop/cart.py::Cart.checkout")).unwrap();
    let evidence = snapshot.selector().select_for_flow(&flow);
    let record = record(
        Intent::Qa,
        evidence,
        vec![
            cite("shop/cart.py::Cart.checkout"),
            ReasoningStep::inference("charge runs last [cite:shop/payments.py::charge]"),
        ],
    );

    let verified = Verifier::new(snapshot.index()).verify(record.clone()).unwrap();
    assert_eq!(verified.record(), &record);
}

#[tokio::test]
async fn rejects_unknown_and_out_of_evidence_citations() {
    let snapshot = shop().await;
    let flow = snapshot.flow(&id("shop/cart.py::Cart.checkout")).unwrap();
    let evidence = snapshot.selector().select_for_flow(&flow);
    let verifier = Verifier::new(snapshot.index());

    let unknown = record(Intent::Qa, evidence.clone(), vec![cite("shop/ledger.py::credit")]);
    assert_eq!(
        verifier.check(&unknown),
        Err(VerificationFailure::UnknownCitation {
            citation: "shop/ledger.py::credit".to_string()
        })
    );

    let unseen = record(
        Intent::Qa,
        evidence.clone(),
        vec![
            cite("shop/cart.py::Cart.checkout"),
            ReasoningStep::inference("refunds exist [cite:shop/payments.py::refund]"),
        ],
    );
    let failure = verifier.check(&unseen).unwrap_err();
    assert_eq!(failure.offending(), Some("shop/payments.py::refund"));

    let uncited = record(Intent::Qa, evidence, vec![ReasoningStep::inference("trust me")]);
    assert_eq!(verifier.check(&uncited), Err(VerificationFailure::Uncited));
}

#[tokio::test]
async fn proposal_integration_points_must_come_from_the_flow() {
    let snapshot = shop().await;
    let flow = snapshot.flow(&id("shop/cart.py::Cart.checkout")).unwrap();
    let selector = snapshot.selector();
    let verifier = Verifier::new(snapshot.index());

    let mut proposal = record(
        Intent::DesignProposal,
        selector.select_for_flow(&flow),
        vec![cite("shop/cart.py::Cart.checkout")],
    );
    assert_eq!(
        verifier.check(&proposal),
        Err(VerificationFailure::MissingIntegrationPoints)
    );

    proposal.integration_points = vec!["shop/payments.py::refund".to_string()];
    assert_eq!(
        verifier.check(&proposal),
        Err(VerificationFailure::IntegrationPointOutsideFlow {
            point: "shop/payments.py::refund".to_string()
        })
    );

    proposal.integration_points = vec!["shop/cart.py::Cart.checkout".to_string()];
    assert_eq!(verifier.check(&proposal), Ok(()));

    let mut detached = proposal.clone();
    detached.evidence = selector.select_for_query("checkout", &[id("shop/cart.py::Cart.checkout")]);
    assert_eq!(verifier.check(&detached), Err(VerificationFailure::MissingOrigin));
}

#[tokio::test]
async fn proposal_cannot_integrate_at_a_unit_truncated_from_evidence() {
    let snapshot = snapshot_of(
        &[(
            "wide.py",
            "def hub():\n    a()\n    b()\n    c()\n\ndef a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n",
        )],
        EvidenceConfig {
            capacity: 2,
            ..EvidenceConfig::default()
        },
    )
    .await;
    let flow = snapshot.flow(&id("wide.py::hub")).unwrap();
    let evidence = snapshot.selector().select_for_flow(&flow);
    assert!(evidence.contains(&id("wide.py::a")));
    assert!(!evidence.contains(&id("wide.py::c")));
    assert!(evidence.origin().unwrap().admits("wide.py::c"));

    let request = PromptBuilder::new(Intent::DesignProposal, "Log every hub call")
        .with_flow(&flow)
        .build(&evidence, 1, None);
    assert!(request.integration_candidates.contains(&"wide.py::a".to_string()));
    assert!(!request.integration_candidates.contains(&"wide.py::c".to_string()));
    assert!(!request.integration_candidates.contains(&"wide.py::hub".to_string()));

    let verifier = Verifier::new(snapshot.index());
    let mut proposal = record(Intent::DesignProposal, evidence, vec![cite("wide.py::a")]);
    proposal.integration_points = vec!["wide.py::c".to_string()];
    let failure = verifier.check(&proposal).unwrap_err();
    assert_eq!(
        failure,
        VerificationFailure::IntegrationPointNotInEvidence {
            point: "wide.py::c".to_string()
        }
    );
    assert_eq!(failure.offending(), Some("wide.py::c"));

    proposal.integration_points = vec!["wide.py::a".to_string()];
    assert_eq!(verifier.check(&proposal), Ok(()));
}

#[tokio::test]
async fn evidence_from_another_snapshot_is_stale() {
    let old = shop().await;
    let flow = old.flow(&id("shop/cart.py::Cart.checkout")).unwrap();
    let evidence = old.selector().select_for_flow(&flow);

    let edited_cart = CART.replace("<= 0", "< 1");
    let new = snapshot_of(
        &[("shop/cart.py", edited_cart.as_str()), ("shop/payments.py", PAYMENTS)],
        EvidenceConfig::default(),
    )
    .await;

    let stale = record(Intent::Qa, evidence, vec![cite("shop/cart.py::Cart.checkout")]);
    assert_eq!(
        Verifier::new(new.index()).check(&stale),
        Err(VerificationFailure::StaleEvidence {
            id: "shop/cart.py::Cart.checkout".to_string()
        })
    );
}
