//! # Repotrace Graph
//!
//! Business-flow extraction and evidence selection over an indexed repository.
//!
//! ## Architecture
//!
//! ```text
//! SourceIndex (one version)
//!     │
//!     ├──> Code Graph (petgraph)
//!     │      ├─ Nodes: units and external symbols
//!     │      └─ Edges: calls and references, in source order
//!     │
//!     ├──> Flow Extractor
//!     │      ├─ Bounded DFS (depth, fan-out, no re-entry)
//!     │      ├─ Decision points (verbatim condition spans)
//!     │      └─ Boundary nodes (externals, limits, leaves)
//!     │
//!     └──> Evidence Selector
//!            ├─ select_for_flow  (centrality truncation)
//!            ├─ select_for_query (best-first hop expansion)
//!            └─ expand           (lifetime-bounded rounds)
//! ```

mod error;
mod evidence;
mod flow;
mod graph;
mod relevance;
mod snapshot;
mod types;

pub use error::{GraphError, Result};
pub use evidence::{EvidenceConfig, EvidenceSelector, EvidenceSet, EvidenceSpan, ExpansionRequest};
pub use flow::{
    Boundary, BoundaryReason, DecisionPoint, Flow, FlowConfig, FlowEdge, FlowExtractor,
    FlowOrigin, FlowStep,
};
pub use relevance::tokenize;
pub use snapshot::AnalysisSnapshot;
pub use types::{CodeGraph, GraphEdge, GraphNode, RelationshipType};
