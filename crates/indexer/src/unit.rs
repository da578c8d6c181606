use crate::identifier::{EdgeTarget, UnitId};
use repotrace_code_units::{BranchMarker, ByteSpan, Language, ReferenceKind, UnitKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A resolved call or reference from one unit to another symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: ReferenceKind,
    pub target: EdgeTarget,

    /// Where the reference occurs in the source unit's file
    pub site: ByteSpan,
}

/// An indexed function, method, class or opaque module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub language: Language,

    /// Byte range in the unit's source file
    pub span: ByteSpan,

    /// Direct edges in source order, one per distinct target
    pub edges: Vec<Edge>,

    /// Conditional constructs inside the span, in source order
    pub branches: Vec<BranchMarker>,

    pub documentation: Option<String>,

    /// Parse diagnostic; set only for opaque leaf units
    pub parse_error: Option<String>,
}

impl CodeUnit {
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.parse_error.is_some()
    }

    /// Internal targets of this unit's edges, in edge order
    pub fn internal_targets(&self) -> impl Iterator<Item = &UnitId> + '_ {
        self.edges.iter().filter_map(|edge| edge.target.as_internal())
    }

    /// External symbols this unit calls, in edge order
    pub fn external_targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.edges.iter().filter_map(|edge| match &edge.target {
            EdgeTarget::External(name) => Some(name.as_str()),
            EdgeTarget::Internal(_) => None,
        })
    }
}

/// One indexed source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Normalized path (the prefix of every unit id in this file)
    pub path: String,

    /// Path as enumerated, before normalization
    pub original_path: String,

    pub language: Language,
    pub line_count: usize,
    pub content: Arc<str>,
}

impl SourceFile {
    /// Exact source text of a span in this file
    #[must_use]
    pub fn slice(&self, span: &ByteSpan) -> Option<&str> {
        span.slice(&self.content)
    }
}
