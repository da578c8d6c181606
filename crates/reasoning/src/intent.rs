use serde::{Deserialize, Serialize};
use std::fmt;

/// What a generation request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// A question about existing business logic and its grounded answer
    Qa,
    /// A design proposal for a requested feature
    DesignProposal,
}

impl Intent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::DesignProposal => "design_proposal",
        }
    }

    /// Whether records of this intent must name integration points
    #[must_use]
    pub const fn needs_integration_points(self) -> bool {
        matches!(self, Self::DesignProposal)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
