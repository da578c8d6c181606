use crate::error::IndexerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symbol used for units that stand for a whole (unparseable) file
pub const MODULE_SYMBOL: &str = "<module>";

/// Prefix used when rendering out-of-repository symbols
pub const EXTERN_PREFIX: &str = "extern::";

const PATH_SEPARATOR: &str = "::";

/// Stable identifier of a code unit: normalized path, qualified symbol, overload index.
///
/// Renders as `src/billing.py::Invoice.total` or `src/lib.rs::parse#2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId {
    path: String,
    symbol: String,
    overload: Option<u32>,
}

impl UnitId {
    /// Build an identifier; `path` is normalized
    #[must_use]
    pub fn new(path: &str, symbol: impl Into<String>, overload: Option<u32>) -> Self {
        Self {
            path: normalize_path(path),
            symbol: symbol.into(),
            overload,
        }
    }

    /// Identifier of the opaque unit standing for a whole file
    #[must_use]
    pub fn module(path: &str) -> Self {
        Self::new(path, MODULE_SYMBOL, None)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub const fn overload(&self) -> Option<u32> {
        self.overload
    }

    /// Last segment of the symbol (`total` for `Invoice.total`)
    #[must_use]
    pub fn name(&self) -> &str {
        last_symbol_segment(&self.symbol)
    }

    #[must_use]
    pub fn is_module(&self) -> bool {
        self.symbol == MODULE_SYMBOL
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PATH_SEPARATOR}{}", self.path, self.symbol)?;
        if let Some(n) = self.overload {
            write!(f, "#{n}")?;
        }
        Ok(())
    }
}

impl FromStr for UnitId {
    type Err = IndexerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let Some((path, rest)) = raw.split_once(PATH_SEPARATOR) else {
            return Err(IndexerError::InvalidIdentifier(raw.to_string()));
        };
        if path.is_empty() || rest.is_empty() {
            return Err(IndexerError::InvalidIdentifier(raw.to_string()));
        }

        let (symbol, overload) = match rest.rsplit_once('#') {
            Some((symbol, n)) if !symbol.is_empty() => match n.parse::<u32>() {
                Ok(n) => (symbol, Some(n)),
                Err(_) => (rest, None),
            },
            _ => (rest, None),
        };

        Ok(Self {
            path: normalize_path(path),
            symbol: symbol.to_string(),
            overload,
        })
    }
}

impl TryFrom<String> for UnitId {
    type Error = IndexerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.to_string()
    }
}

/// Where an edge points: a unit in the index or a symbol defined outside the repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "target")]
pub enum EdgeTarget {
    Internal(UnitId),
    External(String),
}

impl EdgeTarget {
    #[must_use]
    pub const fn as_internal(&self) -> Option<&UnitId> {
        match self {
            Self::Internal(id) => Some(id),
            Self::External(_) => None,
        }
    }

    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

impl fmt::Display for EdgeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(id) => id.fmt(f),
            Self::External(name) => write!(f, "{EXTERN_PREFIX}{name}"),
        }
    }
}

/// Normalize a repository-relative path so that spelling differences map to one identifier.
///
/// Backslashes become `/`, `.` components vanish, `..` pops its parent and ASCII letters
/// are lowercased.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/").to_ascii_lowercase()
}

pub(crate) fn last_symbol_segment(symbol: &str) -> &str {
    let after_colons = symbol.rsplit("::").next().unwrap_or(symbol);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_path_spellings() {
        assert_eq!(normalize_path("./src/Billing.py"), "src/billing.py");
        assert_eq!(normalize_path("src\\api\\..\\core\\Cart.ts"), "src/core/cart.ts");
        assert_eq!(normalize_path("src//lib.rs"), "src/lib.rs");
    }

    #[test]
    fn renders_and_parses_identifiers() {
        let id = UnitId::new("src/Invoice.rs", "Invoice::total", Some(2));
        assert_eq!(id.to_string(), "src/invoice.rs::Invoice::total#2");
        assert_eq!(id.name(), "total");

        let parsed: UnitId = "src/invoice.rs::Invoice::total#2".parse().unwrap();
        assert_eq!(parsed, id);

        let python: UnitId = "cart.py::Cart.checkout".parse().unwrap();
        assert_eq!(python.symbol(), "Cart.checkout");
        assert_eq!(python.name(), "checkout");
        assert_eq!(python.overload(), None);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!("no_separator".parse::<UnitId>().is_err());
        assert!("::symbol".parse::<UnitId>().is_err());
        assert!("path.rs::".parse::<UnitId>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = UnitId::module("Broken.py");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"broken.py::<module>\"");
        let back: UnitId = serde_json::from_str(&json).unwrap();
        assert!(back.is_module());
    }

    #[test]
    fn external_targets_render_with_prefix() {
        let target = EdgeTarget::External("requests.post".to_string());
        assert_eq!(target.to_string(), "extern::requests.post");
        assert!(target.as_internal().is_none());
    }
}
