use crate::error::{GraphError, Result};
use crate::types::{CodeGraph, GraphNode};
use repotrace_code_units::{BranchKind, ByteSpan, UnitKind};
use repotrace_indexer::{SourceIndex, UnitId, EXTERN_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bounds on flow traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum call depth below the entry unit
    pub max_depth: usize,

    /// Maximum callees expanded per unit
    pub max_fan_out: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_fan_out: 8,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_depth == 0 {
            return Err("flow.max_depth must be > 0".to_string());
        }
        if self.max_fan_out == 0 {
            return Err("flow.max_fan_out must be > 0".to_string());
        }
        Ok(())
    }
}

/// One participating unit, in traversal (preorder) position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub unit: UnitId,

    /// Hops from the entry unit
    pub depth: usize,
}

/// A branch inside a participating unit, with its condition quoted verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPoint {
    pub unit: UnitId,
    pub kind: BranchKind,
    pub condition: ByteSpan,

    /// Exact source text of `condition`
    pub text: String,
}

/// Why traversal stopped at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryReason {
    /// Symbol defined outside the repository
    External,
    /// Internal unit beyond `max_depth`
    DepthLimit,
    /// Internal unit beyond `max_fan_out`
    FanOutLimit,
    /// Unit has no further internal edges to follow
    Leaf,
}

/// Terminal node of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    /// Participating unit where traversal stopped
    pub from: UnitId,

    /// Rendered target (`extern::name` for externals, the unit id otherwise)
    pub target: String,

    pub reason: BoundaryReason,
}

/// Internal edge between two participating units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: UnitId,
    pub to: UnitId,
}

/// A connected sub-graph of units reached from one entry.
///
/// Derived data: recomputed from the index, never persisted as ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub entry: UnitId,

    /// Participating units, entry first, no duplicates
    pub steps: Vec<FlowStep>,

    /// Internal edges between participating units, in discovery order
    pub edges: Vec<FlowEdge>,

    pub decision_points: Vec<DecisionPoint>,
    pub boundaries: Vec<Boundary>,
}

/// Where a flow starts and where it touches the rest of the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOrigin {
    pub entry: UnitId,

    /// Participating units that sit on the flow's boundary
    pub boundary_units: Vec<UnitId>,

    /// External boundary nodes, rendered `extern::name`
    pub external: Vec<String>,
}

impl FlowOrigin {
    /// Whether `identifier` names the entry or a boundary node
    #[must_use]
    pub fn admits(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if identifier.starts_with(EXTERN_PREFIX) {
            return self.external.iter().any(|e| e == identifier);
        }
        identifier
            .parse::<UnitId>()
            .is_ok_and(|id| id == self.entry || self.boundary_units.contains(&id))
    }
}

impl Flow {
    /// Participating unit ids in traversal order
    pub fn unit_ids(&self) -> impl Iterator<Item = &UnitId> + '_ {
        self.steps.iter().map(|step| &step.unit)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &UnitId) -> bool {
        self.steps.iter().any(|step| &step.unit == id)
    }

    /// Incoming edges of `id` from other participating units
    #[must_use]
    pub fn centrality(&self, id: &UnitId) -> usize {
        self.edges.iter().filter(|edge| &edge.to == id).count()
    }

    /// Entry plus boundary nodes, in first-seen order
    #[must_use]
    pub fn origin(&self) -> FlowOrigin {
        let mut boundary_units = Vec::new();
        let mut external = Vec::new();
        for boundary in &self.boundaries {
            if !boundary_units.contains(&boundary.from) {
                boundary_units.push(boundary.from.clone());
            }
            if boundary.reason == BoundaryReason::External && !external.contains(&boundary.target) {
                external.push(boundary.target.clone());
            }
        }
        FlowOrigin {
            entry: self.entry.clone(),
            boundary_units,
            external,
        }
    }
}

/// Extracts bounded flows from an index and its graph
pub struct FlowExtractor<'a> {
    index: &'a SourceIndex,
    graph: &'a CodeGraph,
    config: FlowConfig,
}

struct Traversal {
    visited: HashSet<UnitId>,
    flow: Flow,
}

impl<'a> FlowExtractor<'a> {
    pub fn new(index: &'a SourceIndex, graph: &'a CodeGraph, config: FlowConfig) -> Self {
        Self {
            index,
            graph,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Depth-first (preorder) traversal from `entry`, bounded by depth and fan-out.
    ///
    /// A unit already in the flow is never re-entered, so cyclic call graphs terminate.
    pub fn extract(&self, entry: &UnitId) -> Result<Flow> {
        if !self.index.contains(entry) {
            return Err(GraphError::NodeNotFound(entry.to_string()));
        }

        let mut traversal = Traversal {
            visited: HashSet::new(),
            flow: Flow {
                entry: entry.clone(),
                steps: Vec::new(),
                edges: Vec::new(),
                decision_points: Vec::new(),
                boundaries: Vec::new(),
            },
        };
        self.visit(entry, 0, &mut traversal);

        log::debug!(
            "Flow {entry}: {} units, {} decision points, {} boundaries",
            traversal.flow.steps.len(),
            traversal.flow.decision_points.len(),
            traversal.flow.boundaries.len()
        );
        Ok(traversal.flow)
    }

    fn visit(&self, id: &UnitId, depth: usize, traversal: &mut Traversal) {
        traversal.visited.insert(id.clone());
        traversal.flow.steps.push(FlowStep {
            unit: id.clone(),
            depth,
        });
        self.record_decision_points(id, &mut traversal.flow);

        let Some(node) = self.graph.find_node(id) else {
            return;
        };

        let mut expanded = 0usize;
        let mut followed_any = false;
        for (target, _) in self.graph.outgoing(node) {
            match self.graph.get_node(target) {
                Some(GraphNode::External(name)) => {
                    traversal.flow.boundaries.push(Boundary {
                        from: id.clone(),
                        target: format!("{EXTERN_PREFIX}{name}"),
                        reason: BoundaryReason::External,
                    });
                }
                Some(GraphNode::Unit(callee)) => {
                    if traversal.visited.contains(callee) {
                        push_edge(&mut traversal.flow, id, callee);
                        followed_any = true;
                        continue;
                    }

                    let reason = if depth + 1 > self.config.max_depth {
                        Some(BoundaryReason::DepthLimit)
                    } else if expanded >= self.config.max_fan_out {
                        Some(BoundaryReason::FanOutLimit)
                    } else {
                        None
                    };

                    if let Some(reason) = reason {
                        traversal.flow.boundaries.push(Boundary {
                            from: id.clone(),
                            target: callee.to_string(),
                            reason,
                        });
                        continue;
                    }

                    push_edge(&mut traversal.flow, id, callee);
                    expanded += 1;
                    followed_any = true;
                    self.visit(callee, depth + 1, traversal);
                }
                None => {}
            }
        }

        if !followed_any {
            traversal.flow.boundaries.push(Boundary {
                from: id.clone(),
                target: id.to_string(),
                reason: BoundaryReason::Leaf,
            });
        }
    }

    fn record_decision_points(&self, id: &UnitId, flow: &mut Flow) {
        let Some(unit) = self.index.get(id) else {
            return;
        };
        for branch in &unit.branches {
            match self.index.slice(id.path(), &branch.condition) {
                Some(text) => flow.decision_points.push(DecisionPoint {
                    unit: id.clone(),
                    kind: branch.kind,
                    condition: branch.condition,
                    text: text.to_string(),
                }),
                None => log::warn!("{id}: branch condition {:?} is out of bounds", branch.condition),
            }
        }
    }

    /// Propose entry points structurally and extract their flows.
    ///
    /// Candidates are callable, parsed, non-test units with no callers other than
    /// themselves (or tests), whose flow has a decision point or at least two units. Ordered by
    /// decision points, then size (both descending), then identifier; capped at `max_flows`.
    pub fn discover(&self, max_flows: usize) -> Vec<Flow> {
        let mut flows = Vec::new();
        for unit in self.index.units() {
            if !unit.kind.is_callable() || unit.is_opaque() || is_test_unit(&unit.id) {
                continue;
            }
            if unit.id.name().starts_with("__") {
                continue;
            }
            let has_foreign_caller = self
                .index
                .referenced_by(&unit.id)
                .iter()
                .any(|caller| {
                    caller != &unit.id
                        && !is_test_unit(caller)
                        && !self.is_container_of(caller, &unit.id)
                });
            if has_foreign_caller {
                continue;
            }

            let Ok(flow) = self.extract(&unit.id) else {
                continue;
            };
            if flow.decision_points.is_empty() && flow.len() < 2 {
                continue;
            }
            flows.push(flow);
        }

        flows.sort_by(|a, b| {
            b.decision_points
                .len()
                .cmp(&a.decision_points.len())
                .then_with(|| b.len().cmp(&a.len()))
                .then_with(|| a.entry.cmp(&b.entry))
        });
        flows.truncate(max_flows);
        log::info!("Discovered {} business flows", flows.len());
        flows
    }

    /// Class units reference their members; that is containment, not a call
    fn is_container_of(&self, container: &UnitId, member: &UnitId) -> bool {
        self.index
            .get(container)
            .is_some_and(|unit| unit.kind == UnitKind::Class && container.path() == member.path())
    }
}

fn push_edge(flow: &mut Flow, from: &UnitId, to: &UnitId) {
    flow.edges.push(FlowEdge {
        from: from.clone(),
        to: to.clone(),
    });
}

fn is_test_unit(id: &UnitId) -> bool {
    let name = id.name();
    if name.starts_with("test_") {
        return true;
    }

    let path = id.path();
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    path.split('/').any(|part| matches!(part, "tests" | "test" | "__tests__" | "spec"))
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || file.contains(".test.")
        || file.contains(".spec.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_of;
    use pretty_assertions::assert_eq;

    fn names(flow: &Flow) -> Vec<&str> {
        flow.unit_ids().map(UnitId::name).collect()
    }

    #[tokio::test]
    async fn fan_out_limit_records_boundaries() {
        let index = index_of(&[(
            "wide.py",
            "def hub():\n    a()\n    b()\n    c()\n\ndef a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n",
        )])
        .await;
        let graph = CodeGraph::from_index(&index);
        let config = FlowConfig {
            max_depth: 4,
            max_fan_out: 2,
        };
        let flow = FlowExtractor::new(&index, &graph, config)
            .extract(&"wide.py::hub".parse().unwrap())
            .unwrap();

        assert_eq!(names(&flow), vec!["hub", "a", "b"]);
        assert!(flow.boundaries.iter().any(|b| {
            b.reason == BoundaryReason::FanOutLimit && b.target == "wide.py::c"
        }));
    }

    #[tokio::test]
    async fn depth_limit_stops_descent() {
        let index = index_of(&[(
            "deep.py",
            "def a():\n    b()\n\ndef b():\n    c()\n\ndef c():\n    d()\n\ndef d():\n    pass\n",
        )])
        .await;
        let graph = CodeGraph::from_index(&index);
        let config = FlowConfig {
            max_depth: 2,
            max_fan_out: 8,
        };
        let flow = FlowExtractor::new(&index, &graph, config)
            .extract(&"deep.py::a".parse().unwrap())
            .unwrap();

        assert_eq!(names(&flow), vec!["a", "b", "c"]);
        assert_eq!(flow.steps[2].depth, 2);
        let origin = flow.origin();
        assert!(origin.admits("deep.py::c"));
        assert!(origin.admits("deep.py::a"));
        assert!(!origin.admits("deep.py::b"));
    }

    #[tokio::test]
    async fn decision_points_quote_conditions_verbatim() {
        let index = index_of(&[(
            "rules.py",
            "def approve(order):\n    if order.total > 1000 and not order.vip:\n        return escalate(order)\n    return True\n\ndef escalate(order):\n    return notify(order)\n",
        )])
        .await;
        let graph = CodeGraph::from_index(&index);
        let flow = FlowExtractor::new(&index, &graph, FlowConfig::default())
            .extract(&"rules.py::approve".parse().unwrap())
            .unwrap();

        assert_eq!(flow.decision_points.len(), 1);
        assert_eq!(flow.decision_points[0].text, "order.total > 1000 and not order.vip");
        assert_eq!(flow.decision_points[0].kind, BranchKind::If);

        let origin = flow.origin();
        assert_eq!(origin.external, vec!["extern::notify".to_string()]);
        assert!(origin.admits("extern::notify"));
    }

    #[tokio::test]
    async fn discover_prefers_rule_heavy_entry_points() {
        let index = index_of(&[
            (
                "app/orders.py",
                "def place_order(order):\n    if order.empty:\n        return None\n    validate(order)\n    return save(order)\n\ndef validate(order):\n    if order.total < 0:\n        raise ValueError()\n\ndef save(order):\n    return db.insert(order)\n",
            ),
            ("app/util.py", "def lonely():\n    return 1\n"),
            (
                "tests/test_orders.py",
                "def test_place_order():\n    if True:\n        place_order(None)\n",
            ),
        ])
        .await;
        let graph = CodeGraph::from_index(&index);
        let extractor = FlowExtractor::new(&index, &graph, FlowConfig::default());
        let flows = extractor.discover(10);

        let entries: Vec<String> = flows.iter().map(|f| f.entry.to_string()).collect();
        assert_eq!(entries, vec!["app/orders.py::place_order".to_string()]);
        assert_eq!(flows[0].decision_points.len(), 2);
    }

    #[test]
    fn recognizes_test_units() {
        assert!(is_test_unit(&"tests/cart.py::checkout".parse().unwrap()));
        assert!(is_test_unit(&"src/cart_test.go.py::run".parse().unwrap()));
        assert!(is_test_unit(&"src/cart.py::test_checkout".parse().unwrap()));
        assert!(is_test_unit(&"src/cart.spec.ts::run".parse().unwrap()));
        assert!(!is_test_unit(&"src/cart.py::checkout".parse().unwrap()));
    }
}
