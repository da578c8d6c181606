use crate::types::{CodeGraph, GraphEdge, GraphNode, RelationshipType};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use repotrace_indexer::UnitId;
use std::collections::{HashSet, VecDeque};

impl CodeGraph {
    /// Outgoing edges of a node in source order
    pub fn outgoing(&self, node: NodeIndex) -> Vec<(NodeIndex, GraphEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(_, edge)| edge.order);
        edges
    }

    /// Find all units that current node calls (outgoing Calls edges), in source order
    pub fn get_callees(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.outgoing(node)
            .into_iter()
            .filter(|(_, edge)| edge.relationship == RelationshipType::Calls)
            .map(|(target, _)| target)
            .collect()
    }

    /// Find all units that reference current node, in identifier order
    pub fn get_callers(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut callers: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.source())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        callers.sort_by(|a, b| self.get_node(*a).cmp(&self.get_node(*b)).then(a.cmp(b)));
        callers
    }

    /// Units reachable from `id` within `max_depth` hops in either direction,
    /// with their hop distance, nearest first
    pub fn neighborhood(&self, id: &UnitId, max_depth: usize) -> Vec<(UnitId, usize)> {
        let Some(start) = self.find_node(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut result = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if current != start {
                if let Some(GraphNode::Unit(unit)) = self.get_node(current) {
                    result.push((unit.clone(), depth));
                }
            }
            if depth >= max_depth {
                continue;
            }

            let neighbors = self
                .outgoing(current)
                .into_iter()
                .map(|(target, _)| target)
                .chain(self.get_callers(current));
            for next in neighbors {
                if matches!(self.get_node(next), Some(GraphNode::Unit(_))) && visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        result
    }
}
