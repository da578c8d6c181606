mod support;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use repotrace_graph::{CodeGraph, FlowConfig, FlowExtractor};
use repotrace_indexer::UnitId;
use std::collections::HashSet;
use support::{call_graph_module, index_blocking};

#[test]
fn mutual_recursion_yields_both_units_once() {
    let index = index_blocking(vec![(
        "cycle.py".to_string(),
        "def A(n):\n    return B(n)\n\ndef B(n):\n    return A(n - 1)\n".to_string(),
    )]);
    let graph = CodeGraph::from_index(&index);
    let extractor = FlowExtractor::new(&index, &graph, FlowConfig::default());

    let flow = extractor.extract(&"cycle.py::A".parse().unwrap()).unwrap();

    let units: Vec<String> = flow.unit_ids().map(ToString::to_string).collect();
    assert_eq!(units, vec!["cycle.py::A".to_string(), "cycle.py::B".to_string()]);
    assert_eq!(flow.edges.len(), 2);
    assert_eq!(flow.centrality(&"cycle.py::A".parse().unwrap()), 1);
}

#[test]
fn cross_file_flow_keeps_traversal_order() {
    let index = index_blocking(vec![
        (
            "svc/checkout.py".to_string(),
            "from svc import payments, stock\n\ndef checkout(cart):\n    stock.reserve(cart)\n    if cart.total > 0:\n        payments.charge(cart)\n".to_string(),
        ),
        (
            "svc/stock.py".to_string(),
            "def reserve(cart):\n    for item in cart.items:\n        lock(item)\n\ndef lock(item):\n    pass\n".to_string(),
        ),
        (
            "svc/payments.py".to_string(),
            "def charge(cart):\n    return stripe.Charge.create(amount=cart.total)\n".to_string(),
        ),
    ]);
    let graph = CodeGraph::from_index(&index);
    let flow = FlowExtractor::new(&index, &graph, FlowConfig::default())
        .extract(&"svc/checkout.py::checkout".parse().unwrap())
        .unwrap();

    let units: Vec<&str> = flow.unit_ids().map(UnitId::name).collect();
    assert_eq!(units, vec!["checkout", "reserve", "lock", "charge"]);

    let conditions: Vec<&str> = flow.decision_points.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(conditions, vec!["cart.total > 0"]);

    let origin = flow.origin();
    assert!(origin.admits("extern::Charge.create"));
    assert!(origin.admits("svc/payments.py::charge"));
    assert!(!origin.admits("svc/stock.py::reserve"));
}

fn call_lists() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..9).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(0..n, 0..4), n)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn traversal_terminates_without_duplicates(
        calls in call_lists(),
        depth in 1usize..6,
        fan_out in 1usize..4,
    ) {
        let index = index_blocking(vec![("g.py".to_string(), call_graph_module(&calls))]);
        let graph = CodeGraph::from_index(&index);
        let config = FlowConfig { max_depth: depth, max_fan_out: fan_out };
        let extractor = FlowExtractor::new(&index, &graph, config);

        for i in 0..calls.len() {
            let entry: UnitId = format!("g.py::f{i}").parse().unwrap();
            let flow = extractor.extract(&entry).unwrap();

            let unique: HashSet<&UnitId> = flow.unit_ids().collect();
            prop_assert_eq!(unique.len(), flow.len());
            prop_assert!(flow.len() <= calls.len());
            prop_assert_eq!(&flow.steps[0].unit, &entry);
            prop_assert!(flow.steps.iter().all(|s| s.depth <= depth));
        }
    }
}
