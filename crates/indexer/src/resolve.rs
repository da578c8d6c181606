use crate::identifier::{last_symbol_segment, EdgeTarget, UnitId};
use crate::unit::Edge;
use repotrace_code_units::{Language, RawReference, ReferenceKind, UnitDraft};
use std::collections::{BTreeMap, HashSet};

/// A parsed unit waiting for its references to be resolved
pub(crate) struct PendingUnit {
    pub id: UnitId,
    pub language: Language,
    pub draft: UnitDraft,
}

struct Candidate<'a> {
    id: &'a UnitId,
    parent: Option<&'a str>,
}

/// Name lookup over every parsed unit in the repository
pub(crate) struct SymbolTable<'a> {
    by_name: BTreeMap<&'a str, Vec<Candidate<'a>>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(units: &'a [PendingUnit]) -> Self {
        let mut by_name: BTreeMap<&str, Vec<Candidate<'_>>> = BTreeMap::new();
        for unit in units {
            by_name
                .entry(unit.draft.name.as_str())
                .or_default()
                .push(Candidate {
                    id: &unit.id,
                    parent: unit.draft.parent_scope.as_deref(),
                });
        }
        for candidates in by_name.values_mut() {
            candidates.sort_by(|a, b| a.id.cmp(b.id));
        }
        Self { by_name }
    }

    /// Resolve every raw reference of `unit` into edges, first occurrence per target
    pub fn edges_for(&self, unit: &PendingUnit) -> Vec<Edge> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for reference in &unit.draft.references {
            let target = match self.resolve(unit, reference) {
                Some(id) => EdgeTarget::Internal(id.clone()),
                None if reference.kind == ReferenceKind::Call => {
                    EdgeTarget::External(external_name(unit.language, reference))
                }
                None => continue,
            };

            if seen.insert(target.clone()) {
                edges.push(Edge {
                    kind: reference.kind,
                    target,
                    site: reference.site,
                });
            }
        }

        edges
    }

    /// Pick the unit a reference most plausibly names.
    ///
    /// Preference order: receiver or qualifier match, then same file, then a
    /// repository-wide match. Ties go to the smallest identifier.
    fn resolve(&self, from: &PendingUnit, reference: &RawReference) -> Option<&'a UnitId> {
        let candidates = self.by_name.get(reference.name.as_str())?;
        let file = from.id.path();
        let same_file = |c: &&Candidate<'_>| c.id.path() == file;
        let top_level = |c: &&Candidate<'_>| c.parent.is_none();

        let found = match reference.qualifier.as_deref() {
            Some(receiver) if from.language.is_self_receiver(receiver) => {
                let owner = from.draft.parent_scope.as_deref();
                candidates
                    .iter()
                    .filter(same_file)
                    .find(|c| owner.is_some() && c.parent == owner)
                    .or_else(|| {
                        candidates
                            .iter()
                            .filter(same_file)
                            .find(|c| c.parent.is_some())
                    })
            }
            Some(qualifier) => {
                let owned_by = |c: &&Candidate<'_>| {
                    c.parent
                        .is_some_and(|parent| last_symbol_segment(parent) == qualifier)
                };
                let in_module = |c: &&Candidate<'_>| {
                    c.parent.is_none() && file_stem(c.id.path()) == qualifier.to_ascii_lowercase()
                };
                candidates
                    .iter()
                    .filter(same_file)
                    .find(owned_by)
                    .or_else(|| candidates.iter().find(owned_by))
                    .or_else(|| candidates.iter().find(in_module))
                    .or_else(|| candidates.iter().find(same_file))
                    .or_else(|| match candidates.as_slice() {
                        [only] => Some(only),
                        _ => None,
                    })
            }
            None => candidates
                .iter()
                .filter(same_file)
                .find(top_level)
                .or_else(|| candidates.iter().find(same_file))
                .or_else(|| candidates.iter().find(top_level))
                .or_else(|| candidates.first()),
        };

        found.map(|c| c.id)
    }
}

fn external_name(language: Language, reference: &RawReference) -> String {
    match &reference.qualifier {
        Some(qualifier) => format!(
            "{qualifier}{}{}",
            language.scope_separator(),
            reference.name
        ),
        None => reference.name.clone(),
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split_once('.').map_or(name, |(stem, _)| stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use repotrace_code_units::{ByteSpan, UnitKind};

    fn pending(path: &str, symbol: &str, parent: Option<&str>, refs: &[(&str, Option<&str>)]) -> PendingUnit {
        let name = last_symbol_segment(symbol).to_string();
        PendingUnit {
            id: UnitId::new(path, symbol, None),
            language: Language::Python,
            draft: UnitDraft {
                symbol: symbol.to_string(),
                name,
                kind: if parent.is_some() {
                    UnitKind::Method
                } else {
                    UnitKind::Function
                },
                span: ByteSpan::new(0, 1, 1, 1),
                parent_scope: parent.map(str::to_string),
                documentation: None,
                references: refs
                    .iter()
                    .map(|(name, qualifier)| RawReference {
                        name: (*name).to_string(),
                        qualifier: qualifier.map(str::to_string),
                        kind: ReferenceKind::Call,
                        site: ByteSpan::new(0, 1, 1, 1),
                    })
                    .collect(),
                branches: Vec::new(),
            },
        }
    }

    fn targets(table: &SymbolTable<'_>, unit: &PendingUnit) -> Vec<String> {
        table
            .edges_for(unit)
            .iter()
            .map(|e| e.target.to_string())
            .collect()
    }

    #[test]
    fn prefers_same_file_then_smallest_identifier() {
        let units = vec![
            pending("a.py", "helper", None, &[]),
            pending("b.py", "helper", None, &[]),
            pending("c.py", "helper", None, &[]),
            pending("b.py", "run", None, &[("helper", None)]),
            pending("d.py", "run", None, &[("helper", None)]),
        ];
        let table = SymbolTable::new(&units);
        assert_eq!(targets(&table, &units[3]), vec!["b.py::helper"]);
        assert_eq!(targets(&table, &units[4]), vec!["a.py::helper"]);
    }

    #[test]
    fn self_receiver_resolves_to_owner_member() {
        let units = vec![
            pending("cart.py", "total", None, &[]),
            pending("cart.py", "Cart.total", Some("Cart"), &[]),
            pending("cart.py", "Cart.checkout", Some("Cart"), &[("total", Some("self"))]),
        ];
        let table = SymbolTable::new(&units);
        assert_eq!(targets(&table, &units[2]), vec!["cart.py::Cart.total"]);
    }

    #[test]
    fn module_qualifier_matches_file_stem() {
        let units = vec![
            pending("billing.py", "charge", None, &[]),
            pending("orders.py", "place", None, &[("charge", Some("billing"))]),
        ];
        let table = SymbolTable::new(&units);
        assert_eq!(targets(&table, &units[1]), vec!["billing.py::charge"]);
    }

    #[test]
    fn unresolved_calls_become_external_and_deduplicate() {
        let units = vec![pending(
            "api.py",
            "fetch",
            None,
            &[("post", Some("requests")), ("post", Some("requests")), ("len", None)],
        )];
        let table = SymbolTable::new(&units);
        assert_eq!(
            targets(&table, &units[0]),
            vec!["extern::requests.post", "extern::len"]
        );
    }
}
