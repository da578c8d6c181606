use crate::identifier::UnitId;
use crate::stats::IndexStats;
use crate::unit::{CodeUnit, SourceFile};
use repotrace_code_units::ByteSpan;
use serde::Serialize;
use std::collections::BTreeMap;

/// Immutable, versioned mapping from identifier to code unit.
///
/// Built once by [`crate::IndexBuilder`] and shared behind an `Arc`; a rebuild
/// produces a new value rather than mutating this one.
#[derive(Debug, Clone, Serialize)]
pub struct SourceIndex {
    pub(crate) version: u64,
    pub(crate) fingerprint: String,
    pub(crate) units: BTreeMap<UnitId, CodeUnit>,
    pub(crate) referenced_by: BTreeMap<UnitId, Vec<UnitId>>,
    pub(crate) files: BTreeMap<String, SourceFile>,
    pub(crate) stats: IndexStats,
}

impl SourceIndex {
    /// Monotonic version assigned when the index was published
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// SHA-256 (hex) over the sorted set of indexed paths and contents
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub const fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Number of units, opaque ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units extracted from files that parsed
    #[must_use]
    pub fn parsed_unit_count(&self) -> usize {
        self.units.values().filter(|u| !u.is_opaque()).count()
    }

    #[must_use]
    pub fn opaque_unit_count(&self) -> usize {
        self.units.values().filter(|u| u.is_opaque()).count()
    }

    #[must_use]
    pub fn get(&self, id: &UnitId) -> Option<&CodeUnit> {
        self.units.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }

    /// Look a unit up by its rendered identifier
    #[must_use]
    pub fn get_str(&self, raw: &str) -> Option<&CodeUnit> {
        raw.parse::<UnitId>().ok().and_then(|id| self.units.get(&id))
    }

    /// All units in identifier order
    pub fn units(&self) -> impl Iterator<Item = &CodeUnit> + '_ {
        self.units.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &UnitId> + '_ {
        self.units.keys()
    }

    /// Units whose edges point at `id`, sorted
    #[must_use]
    pub fn referenced_by(&self, id: &UnitId) -> &[UnitId] {
        self.referenced_by.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> + '_ {
        self.files.values()
    }

    #[must_use]
    pub fn file(&self, normalized_path: &str) -> Option<&SourceFile> {
        self.files.get(normalized_path)
    }

    /// Exact text of a span in an indexed file
    #[must_use]
    pub fn slice(&self, normalized_path: &str, span: &ByteSpan) -> Option<&str> {
        self.files.get(normalized_path)?.slice(span)
    }

    /// Exact source text of a unit
    #[must_use]
    pub fn source_text(&self, id: &UnitId) -> Option<&str> {
        let unit = self.units.get(id)?;
        self.slice(id.path(), &unit.span)
    }

    /// Units whose rendered identifier contains `needle` (ASCII case-insensitive)
    #[must_use]
    pub fn match_identifiers(&self, needle: &str) -> Vec<&UnitId> {
        let needle = needle.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.units
            .keys()
            .filter(|id| id.to_string().to_ascii_lowercase().contains(&needle))
            .collect()
    }

    /// Whether two indexes hold the same units, spans and edges
    #[must_use]
    pub fn same_mapping(&self, other: &Self) -> bool {
        self.units == other.units && self.referenced_by == other.referenced_by
    }
}
