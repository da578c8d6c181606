use crate::language::Language;
use serde::{Deserialize, Serialize};

/// Byte range in a source file, with the 1-indexed lines it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteSpan {
    /// Start byte offset (inclusive)
    pub start: usize,

    /// End byte offset (exclusive)
    pub end: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,
}

impl ByteSpan {
    #[must_use]
    pub const fn new(start: usize, end: usize, start_line: usize, end_line: usize) -> Self {
        Self {
            start,
            end,
            start_line,
            end_line,
        }
    }

    /// Span of a tree-sitter node
    #[must_use]
    pub fn of_node(node: tree_sitter::Node<'_>) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    /// Span covering a whole file
    #[must_use]
    pub fn whole(content: &str) -> Self {
        Self {
            start: 0,
            end: content.len(),
            start_line: 1,
            end_line: content.lines().count().max(1),
        }
    }

    /// Length in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether `other` lies entirely within this span
    #[must_use]
    pub const fn contains(&self, other: &ByteSpan) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Slice the spanned text out of its source, if the span is in bounds
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

/// Kind of code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Standalone function
    Function,
    /// Function defined inside a class/impl/trait
    Method,
    /// Class, struct, enum, trait or interface
    Class,
    /// Whole module (used for files that could not be parsed)
    Module,
}

impl UnitKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Module => "module",
        }
    }

    /// Whether the unit executes logic (and can therefore start a flow)
    #[must_use]
    pub const fn is_callable(self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

/// How a unit refers to another symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Direct call (including constructor calls)
    Call,
    /// Type use or containment (class → method)
    Reference,
}

/// Unresolved reference found inside a unit, in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    /// Referenced symbol name (last path segment)
    pub name: String,

    /// Receiver or path qualifier (`Invoice` in `Invoice::new`, `self` in `self.total()`)
    pub qualifier: Option<String>,

    pub kind: ReferenceKind,

    /// Where the reference occurs
    pub site: ByteSpan,
}

/// Structural branching construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    If,
    ElseIf,
    Match,
    Loop,
    Ternary,
}

impl BranchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::ElseIf => "else_if",
            Self::Match => "match",
            Self::Loop => "loop",
            Self::Ternary => "ternary",
        }
    }
}

/// A conditional construct inside a unit, with the exact span of its condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchMarker {
    pub kind: BranchKind,

    /// The whole branching construct
    pub construct: ByteSpan,

    /// The condition/scrutinee expression only
    pub condition: ByteSpan,
}

/// A declaration extracted from one file, before identifiers are assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDraft {
    /// Qualified symbol within the file (`Invoice::total`, `Cart.checkout`)
    pub symbol: String,

    /// Bare name (`total`)
    pub name: String,

    pub kind: UnitKind,

    /// Full declaration span (including the body)
    pub span: ByteSpan,

    /// Enclosing class/impl/trait, if any
    pub parent_scope: Option<String>,

    /// Doc comment or docstring
    pub documentation: Option<String>,

    /// Calls and references in source order
    pub references: Vec<RawReference>,

    /// Branching constructs in source order
    pub branches: Vec<BranchMarker>,
}

/// Everything extracted from one successfully parsed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Path as given by the caller
    pub path: String,

    pub language: Language,

    /// Units in source order
    pub units: Vec<UnitDraft>,

    /// Number of lines in the file
    pub line_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains_and_slice() {
        let source = "fn a() { if x { b() } }";
        let outer = ByteSpan::new(0, source.len(), 1, 1);
        let inner = ByteSpan::new(12, 13, 1, 1);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert_eq!(inner.slice(source), Some("x"));
        assert_eq!(ByteSpan::new(40, 50, 1, 1).slice(source), None);
    }

    #[test]
    fn test_whole_span() {
        let span = ByteSpan::whole("a\nb\nc\n");
        assert_eq!(span.start_line, 1);
        assert_eq!(span.end_line, 3);
        assert_eq!(span.len(), 6);
        assert_eq!(ByteSpan::whole("").end_line, 1);
    }

    #[test]
    fn test_unit_kind_callable() {
        assert!(UnitKind::Function.is_callable());
        assert!(UnitKind::Method.is_callable());
        assert!(!UnitKind::Class.is_callable());
        assert!(!UnitKind::Module.is_callable());
    }
}
