use async_trait::async_trait;
use repotrace_code_units::AnalyzerConfig;
use repotrace_graph::{AnalysisSnapshot, EvidenceConfig, FlowConfig};
use repotrace_indexer::{IndexBuilder, SourceInput, UnitId};
use repotrace_reasoning::{CompletionProvider, CompletionRequest, ProviderError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

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
    return gateway.submit(cart.total())

def refund(payment):
    return gateway.reverse(payment)
";

pub fn id(raw: &str) -> UnitId {
    raw.parse().unwrap()
}

pub async fn snapshot_of(files: &[(&str, &str)], evidence: EvidenceConfig) -> AnalysisSnapshot {
    let sources = files
        .iter()
        .map(|(path, content)| SourceInput::new(*path, *content))
        .collect();
    let index = IndexBuilder::new(AnalyzerConfig::default())
        .unwrap()
        .index_sources(sources)
        .await
        .unwrap();
    AnalysisSnapshot::new(Arc::new(index), FlowConfig::default(), evidence)
}

pub async fn shop() -> AnalysisSnapshot {
    snapshot_of(
        &[("shop/cart.py", CART), ("shop/payments.py", PAYMENTS)],
        EvidenceConfig::default(),
    )
    .await
}

#[allow(dead_code)]
pub enum Reply {
    Text(String),
    Hang,
    Fail,
}

/// Completion collaborator that replays a fixed script and records what it saw
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(replies: &[serde_json::Value]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Reply::Text(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn request(&self, n: usize) -> CompletionRequest {
        self.seen.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            Some(Reply::Fail) => Err(ProviderError::Network("connection reset".to_string())),
            None => Err(ProviderError::InvalidResponse("script exhausted".to_string())),
        }
    }
}
