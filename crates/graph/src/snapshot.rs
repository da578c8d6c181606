use crate::error::Result;
use crate::evidence::{EvidenceConfig, EvidenceSelector};
use crate::flow::{Flow, FlowConfig, FlowExtractor};
use crate::types::CodeGraph;
use repotrace_indexer::{SourceIndex, UnitId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One index version together with everything derived from it.
///
/// The graph and the flow cache belong to exactly one index; a new index means a
/// new snapshot, so derived data is never partially invalidated.
#[derive(Debug)]
pub struct AnalysisSnapshot {
    index: Arc<SourceIndex>,
    graph: CodeGraph,
    flow_config: FlowConfig,
    evidence_config: EvidenceConfig,
    flows: Mutex<HashMap<UnitId, Arc<Flow>>>,
}

impl AnalysisSnapshot {
    pub fn new(index: Arc<SourceIndex>, flow_config: FlowConfig, evidence_config: EvidenceConfig) -> Self {
        let graph = CodeGraph::from_index(&index);
        Self {
            index,
            graph,
            flow_config,
            evidence_config,
            flows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SourceIndex> {
        &self.index
    }

    #[must_use]
    pub const fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.index.version()
    }

    pub fn extractor(&self) -> FlowExtractor<'_> {
        FlowExtractor::new(&self.index, &self.graph, self.flow_config)
    }

    pub fn selector(&self) -> EvidenceSelector<'_> {
        EvidenceSelector::new(&self.index, &self.graph, self.evidence_config)
    }

    /// Flow starting at `entry`, computed once per snapshot
    pub fn flow(&self, entry: &UnitId) -> Result<Arc<Flow>> {
        if let Some(flow) = self.lock_flows().get(entry) {
            return Ok(Arc::clone(flow));
        }

        let flow = Arc::new(self.extractor().extract(entry)?);
        let mut flows = self.lock_flows();
        let cached = flows.entry(entry.clone()).or_insert(flow);
        Ok(Arc::clone(cached))
    }

    /// Discovered business flows, cached alongside single-entry flows
    pub fn discover(&self, max_flows: usize) -> Vec<Arc<Flow>> {
        let discovered = self.extractor().discover(max_flows);
        let mut flows = self.lock_flows();
        discovered
            .into_iter()
            .map(|flow| {
                let cached = flows
                    .entry(flow.entry.clone())
                    .or_insert_with(|| Arc::new(flow));
                Arc::clone(cached)
            })
            .collect()
    }

    #[must_use]
    pub fn cached_flows(&self) -> usize {
        self.lock_flows().len()
    }

    fn lock_flows(&self) -> std::sync::MutexGuard<'_, HashMap<UnitId, Arc<Flow>>> {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_of;

    #[tokio::test]
    async fn flows_are_cached_per_snapshot() {
        let index = Arc::new(
            index_of(&[("a.py", "def a():\n    b()\n\ndef b():\n    pass\n")]).await,
        );
        let snapshot = AnalysisSnapshot::new(index, FlowConfig::default(), EvidenceConfig::default());
        let entry: UnitId = "a.py::a".parse().unwrap();

        let first = snapshot.flow(&entry).unwrap();
        let second = snapshot.flow(&entry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(snapshot.cached_flows(), 1);

        let discovered = snapshot.discover(4);
        assert_eq!(discovered.len(), 1);
        assert!(Arc::ptr_eq(&discovered[0], &first));
    }

    #[tokio::test]
    async fn unknown_entry_is_an_error() {
        let index = Arc::new(index_of(&[("a.py", "def a():\n    pass\n")]).await);
        let snapshot = AnalysisSnapshot::new(index, FlowConfig::default(), EvidenceConfig::default());
        assert!(snapshot.flow(&"a.py::missing".parse().unwrap()).is_err());
    }
}
