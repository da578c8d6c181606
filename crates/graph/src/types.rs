use petgraph::graph::{DiGraph, NodeIndex};
use repotrace_code_units::ReferenceKind;
use repotrace_indexer::{EdgeTarget, SourceIndex, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node in the code graph: an indexed unit or an out-of-repository symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "id")]
pub enum GraphNode {
    Unit(UnitId),
    External(String),
}

impl GraphNode {
    #[must_use]
    pub const fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Self::Unit(id) => Some(id),
            Self::External(_) => None,
        }
    }
}

/// Type of relationship between units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// A calls B
    Calls,

    /// A uses type B, or class A contains member B
    References,
}

impl From<ReferenceKind> for RelationshipType {
    fn from(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::Call => Self::Calls,
            ReferenceKind::Reference => Self::References,
        }
    }
}

/// Edge in code graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relationship: RelationshipType,

    /// Position of the edge in its source unit (source order)
    pub order: usize,
}

/// Call/reference graph derived from one index version
#[derive(Debug, Clone)]
pub struct CodeGraph {
    /// Directed graph (unit -> unit or external symbol)
    pub graph: DiGraph<GraphNode, GraphEdge>,

    /// Index version this graph was derived from
    pub version: u64,

    unit_index: HashMap<UnitId, NodeIndex>,
    external_index: HashMap<String, NodeIndex>,
}

impl CodeGraph {
    /// Derive the graph from an index; nodes are added in identifier order
    pub fn from_index(index: &SourceIndex) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            version: index.version(),
            unit_index: HashMap::with_capacity(index.len()),
            external_index: HashMap::new(),
        };

        for unit in index.units() {
            graph.add_unit(unit.id.clone());
        }

        for unit in index.units() {
            let Some(from) = graph.find_node(&unit.id) else {
                continue;
            };
            for (order, edge) in unit.edges.iter().enumerate() {
                let to = match &edge.target {
                    EdgeTarget::Internal(id) => match graph.find_node(id) {
                        Some(idx) => idx,
                        None => {
                            log::warn!("{} points at unknown unit {id}", unit.id);
                            continue;
                        }
                    },
                    EdgeTarget::External(name) => graph.add_external(name),
                };
                graph.add_edge(
                    from,
                    to,
                    GraphEdge {
                        relationship: edge.kind.into(),
                        order,
                    },
                );
            }
        }

        log::debug!(
            "Built code graph v{}: {} nodes, {} edges",
            graph.version,
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    fn add_unit(&mut self, id: UnitId) -> NodeIndex {
        let idx = self.graph.add_node(GraphNode::Unit(id.clone()));
        self.unit_index.insert(id, idx);
        idx
    }

    fn add_external(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.external_index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(GraphNode::External(name.to_string()));
        self.external_index.insert(name.to_string(), idx);
        idx
    }

    /// Add edge between nodes
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: GraphEdge) {
        self.graph.add_edge(from, to, edge);
    }

    /// Find node by unit identifier
    pub fn find_node(&self, id: &UnitId) -> Option<NodeIndex> {
        self.unit_index.get(id).copied()
    }

    /// Find the node standing for an external symbol
    pub fn find_external(&self, name: &str) -> Option<NodeIndex> {
        self.external_index.get(name).copied()
    }

    /// Get node data
    pub fn get_node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(idx)
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
