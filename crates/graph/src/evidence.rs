use crate::error::{GraphError, Result};
use crate::flow::{Flow, FlowOrigin};
use crate::relevance::{overlap_score, tokenize};
use crate::types::CodeGraph;
use repotrace_code_units::{ByteSpan, UnitKind};
use repotrace_indexer::{SourceIndex, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Limits on evidence selection and expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Maximum spans in one evidence set
    pub capacity: usize,

    /// Maximum expansion rounds over a request's lifetime
    pub max_expansion_depth: usize,

    /// Reference hops explored from the seeds of a free-text query
    pub query_hops: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            capacity: 12,
            max_expansion_depth: 3,
            query_hops: 2,
        }
    }
}

impl EvidenceConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.capacity == 0 {
            return Err("evidence.capacity must be > 0".to_string());
        }
        if self.max_expansion_depth == 0 {
            return Err("evidence.max_expansion_depth must be > 0".to_string());
        }
        Ok(())
    }
}

/// One cited code span, with its text as indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub id: UnitId,
    pub kind: UnitKind,
    pub span: ByteSpan,

    /// Exact source text of the span
    pub text: String,
}

/// Duplicate-free, capacity-bounded set of spans grounding one generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSet {
    spans: Vec<EvidenceSpan>,
    capacity: usize,

    /// Expansion rounds applied so far
    depth: usize,
    max_depth: usize,

    /// Spans left out because the set was full
    dropped: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<FlowOrigin>,
}

impl EvidenceSet {
    #[must_use]
    pub fn new(capacity: usize, max_depth: usize) -> Self {
        Self {
            spans: Vec::new(),
            capacity,
            depth: 0,
            max_depth,
            dropped: 0,
            origin: None,
        }
    }

    #[must_use]
    pub fn spans(&self) -> &[EvidenceSpan] {
        &self.spans
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.spans.len())
    }

    /// Flow this evidence was selected for, if any
    #[must_use]
    pub const fn origin(&self) -> Option<&FlowOrigin> {
        self.origin.as_ref()
    }

    pub fn set_origin(&mut self, origin: FlowOrigin) {
        self.origin = Some(origin);
    }

    #[must_use]
    pub fn contains(&self, id: &UnitId) -> bool {
        self.spans.iter().any(|span| &span.id == id)
    }

    #[must_use]
    pub fn get(&self, id: &UnitId) -> Option<&EvidenceSpan> {
        self.spans.iter().find(|span| &span.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &UnitId> + '_ {
        self.spans.iter().map(|span| &span.id)
    }

    /// Add a span unless it is present or the set is full; returns whether it was added
    fn push(&mut self, span: EvidenceSpan) -> bool {
        if self.contains(&span.id) {
            return false;
        }
        if self.spans.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.spans.push(span);
        true
    }
}

/// What the synthesizer asks for mid-generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "unit")]
pub enum ExpansionRequest {
    /// A specific unit
    Unit(UnitId),
    /// Units that reference the given unit
    CallersOf(UnitId),
    /// Internal units the given unit references
    CalleesOf(UnitId),
}

impl ExpansionRequest {
    #[must_use]
    pub const fn subject(&self) -> &UnitId {
        match self {
            Self::Unit(id) | Self::CallersOf(id) | Self::CalleesOf(id) => id,
        }
    }
}

/// Selects grounding spans for flows and free-text requests
pub struct EvidenceSelector<'a> {
    index: &'a SourceIndex,
    graph: &'a CodeGraph,
    config: EvidenceConfig,
}

impl<'a> EvidenceSelector<'a> {
    pub fn new(index: &'a SourceIndex, graph: &'a CodeGraph, config: EvidenceConfig) -> Self {
        Self {
            index,
            graph,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EvidenceConfig {
        &self.config
    }

    fn empty_set(&self) -> EvidenceSet {
        EvidenceSet::new(self.config.capacity, self.config.max_expansion_depth)
    }

    fn span_of(&self, id: &UnitId) -> Option<EvidenceSpan> {
        let unit = self.index.get(id)?;
        let text = self.index.source_text(id)?;
        Some(EvidenceSpan {
            id: id.clone(),
            kind: unit.kind,
            span: unit.span,
            text: text.to_string(),
        })
    }

    /// All spans of a flow's units, truncated to capacity by dropping the least
    /// central first (incoming edges within the flow; ties keep the earlier unit).
    /// Kept spans stay in traversal order.
    pub fn select_for_flow(&self, flow: &Flow) -> EvidenceSet {
        let mut set = self.empty_set();
        set.set_origin(flow.origin());

        let mut ranked: Vec<(usize, usize, &UnitId)> = flow
            .unit_ids()
            .enumerate()
            .map(|(position, id)| (flow.centrality(id), position, id))
            .collect();

        if ranked.len() > self.config.capacity {
            ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            set.dropped = ranked.len() - self.config.capacity;
            log::info!(
                "EvidenceCapacityExceeded: flow {} has {} units, keeping the {} most central",
                flow.entry,
                ranked.len(),
                self.config.capacity
            );
            ranked.truncate(self.config.capacity);
            ranked.sort_by_key(|(_, position, _)| *position);
        }

        for (_, _, id) in ranked {
            match self.span_of(id) {
                Some(span) => {
                    set.push(span);
                }
                None => log::warn!("Flow unit {id} has no indexed span"),
            }
        }
        set
    }

    /// Seeds for a free-text request: units whose identifier contains a query token,
    /// then units sharing the most tokens; at most `limit`, best first
    pub fn suggest_seeds(&self, text: &str, limit: usize) -> Vec<UnitId> {
        let query = tokenize(text);
        let mut scored: Vec<(usize, &UnitId)> = self
            .index
            .units()
            .filter(|unit| !unit.is_opaque())
            .filter_map(|unit| {
                let score = overlap_score(&query, unit);
                (score > 0).then_some((score, &unit.id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut seeds: Vec<UnitId> = Vec::new();
        for token in &query {
            for id in self.index.match_identifiers(token) {
                if seeds.len() >= limit {
                    break;
                }
                if !seeds.contains(id) && scored.iter().any(|(_, s)| *s == id) {
                    seeds.push(id.clone());
                }
            }
        }
        for (_, id) in scored {
            if seeds.len() >= limit {
                break;
            }
            if !seeds.contains(id) {
                seeds.push(id.clone());
            }
        }
        seeds
    }

    /// Best-first expansion from `seeds`, one reference hop at a time.
    ///
    /// Candidates are re-ranked by token overlap with `text` (ties: fewer hops, then
    /// identifier) until the set is full or no candidates remain.
    pub fn select_for_query(&self, text: &str, seeds: &[UnitId]) -> EvidenceSet {
        let query = tokenize(text);
        let mut set = self.empty_set();

        let mut hops: HashMap<UnitId, usize> = HashMap::new();
        let mut candidates: BTreeSet<UnitId> = BTreeSet::new();
        for seed in seeds.iter().filter(|id| self.index.contains(id)) {
            hops.insert(seed.clone(), 0);
            candidates.insert(seed.clone());
        }

        let mut seen: HashSet<UnitId> = candidates.iter().cloned().collect();
        while set.remaining() > 0 {
            let best = candidates
                .iter()
                .map(|id| {
                    let score = self.index.get(id).map_or(0, |u| overlap_score(&query, u));
                    (score, hops.get(id).copied().unwrap_or(0), id)
                })
                .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(b.2.cmp(a.2)))
                .map(|(_, hop, id)| (id.clone(), hop));
            let Some((id, hop)) = best else {
                break;
            };
            candidates.remove(&id);

            if let Some(span) = self.span_of(&id) {
                set.push(span);
            }

            if hop >= self.config.query_hops {
                continue;
            }
            for (neighbor, _) in self.graph.neighborhood(&id, 1) {
                if seen.insert(neighbor.clone()) {
                    hops.insert(neighbor.clone(), hop + 1);
                    candidates.insert(neighbor);
                }
            }
        }

        if !candidates.is_empty() {
            set.dropped += candidates.len();
            log::info!(
                "EvidenceCapacityExceeded: query left {} candidates unselected",
                candidates.len()
            );
        }
        set
    }

    /// Extend `set` for a mid-generation request.
    ///
    /// Capacity and the expansion-depth counter are enforced across the set's whole
    /// lifetime: every call consumes one round, even when nothing fits. Returns the
    /// identifiers that were added.
    pub fn expand(&self, set: &mut EvidenceSet, request: &ExpansionRequest) -> Result<Vec<UnitId>> {
        if set.depth >= set.max_depth {
            return Err(GraphError::ExpansionDepthExhausted {
                depth: set.depth,
                max_depth: set.max_depth,
            });
        }

        let subject = request.subject();
        if !self.index.contains(subject) {
            set.depth += 1;
            return Err(GraphError::NodeNotFound(subject.to_string()));
        }

        let wanted: Vec<UnitId> = match request {
            ExpansionRequest::Unit(id) => vec![id.clone()],
            ExpansionRequest::CallersOf(id) => self.index.referenced_by(id).to_vec(),
            ExpansionRequest::CalleesOf(id) => self
                .index
                .get(id)
                .map(|unit| unit.internal_targets().cloned().collect())
                .unwrap_or_default(),
        };

        set.depth += 1;
        let mut added = Vec::new();
        let before = set.dropped;
        for id in wanted {
            if let Some(span) = self.span_of(&id) {
                if set.push(span) {
                    added.push(id);
                }
            }
        }
        if set.dropped > before {
            log::info!(
                "EvidenceCapacityExceeded: expansion for {subject} dropped {} spans",
                set.dropped - before
            );
        }
        log::debug!(
            "Expanded evidence for {subject}: +{} (depth {}/{})",
            added.len(),
            set.depth,
            set.max_depth
        );
        Ok(added)
    }
}
