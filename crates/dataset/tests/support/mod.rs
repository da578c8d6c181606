use async_trait::async_trait;
use repotrace_code_units::AnalyzerConfig;
use repotrace_dataset::{PersistenceError, RecordSink};
use repotrace_graph::{AnalysisSnapshot, EvidenceConfig, FlowConfig};
use repotrace_indexer::{IndexBuilder, SourceInput};
use repotrace_reasoning::{CompletionProvider, CompletionRequest, ProviderError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CART: &str = "from shop import payments

class Cart:
    def total(self):
        return sum(self.items)

    def checkout(self):
        if self.total() <= 0:
            raise ValueError(\"empty cart\")
        return payments.charge(self)
";

pub const PAYMENTS: &str = "def charge(cart):
    if cart.currency != \"EUR\":
        cart = convert(cart)
    return gateway.submit(cart.total())

def convert(cart):
    return cart

def refund(payment):
    return gateway.reverse(payment)
";

pub async fn shop() -> Arc<AnalysisSnapshot> {
    let sources = vec![
        SourceInput::new("shop/cart.py", CART),
        SourceInput::new("shop/payments.py", PAYMENTS),
    ];
    let index = IndexBuilder::new(AnalyzerConfig::default())
        .unwrap()
        .index_sources(sources)
        .await
        .unwrap();
    Arc::new(AnalysisSnapshot::new(
        Arc::new(index),
        FlowConfig::default(),
        EvidenceConfig::default(),
    ))
}

/// In-memory sink that fails its first `failures` appends
#[derive(Clone, Default)]
pub struct FlakySink {
    pub lines: Arc<Mutex<Vec<String>>>,
    failures: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FlakySink {
    pub fn failing(failures: usize) -> Self {
        Self {
            lines: Arc::default(),
            failures: Arc::new(AtomicUsize::new(failures)),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for FlakySink {
    async fn append(&mut self, line: &str) -> Result<(), PersistenceError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(PersistenceError::Rejected("disk full".to_string()));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Collaborator that always cites a unit outside every evidence set
#[allow(dead_code)]
pub struct HallucinatingProvider;

#[async_trait]
impl CompletionProvider for HallucinatingProvider {
    fn name(&self) -> &str {
        "hallucinating"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        Ok(serde_json::json!({
            "answer": "Refunds go through the ledger [cite:shop/ledger.py::credit].",
            "integration_points": ["shop/ledger.py::credit"]
        })
        .to_string())
    }
}
