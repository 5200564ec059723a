//! Reconciliation lifecycle.
//!
//! The lifecycle tells the orchestrator how to treat a unit. The load balancer
//! task reads it after validation to decide whether to render and whether the
//! resource has to exist already.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How the orchestrator should treat a reconciliation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Create and repair the remote resource.
    #[default]
    Sync,
    /// Skip the unit entirely.
    Ignore,
    /// Like `Sync`, but insufficient permissions are reported as warnings.
    WarnIfInsufficientAccess,
    /// The resource must already exist; differences are errors.
    ExistsAndValidates,
    /// The resource must already exist; differences are logged.
    ExistsAndWarnIfChanges,
}

impl Lifecycle {
    /// All lifecycle values, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Sync,
        Self::Ignore,
        Self::WarnIfInsufficientAccess,
        Self::ExistsAndValidates,
        Self::ExistsAndWarnIfChanges,
    ];

    /// Returns true if the orchestrator may mutate remote state for this unit.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Sync | Self::WarnIfInsufficientAccess)
    }

    /// Returns true if the resource is expected to exist already.
    #[must_use]
    pub const fn requires_existing(self) -> bool {
        matches!(self, Self::ExistsAndValidates | Self::ExistsAndWarnIfChanges)
    }

    /// The canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Ignore => "ignore",
            Self::WarnIfInsufficientAccess => "warn_if_insufficient_access",
            Self::ExistsAndValidates => "exists_and_validates",
            Self::ExistsAndWarnIfChanges => "exists_and_warn_if_changes",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownLifecycle(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sync() {
        assert_eq!(Lifecycle::default(), Lifecycle::Sync);
    }

    #[test]
    fn mutating_lifecycles() {
        assert!(Lifecycle::Sync.is_mutating());
        assert!(Lifecycle::WarnIfInsufficientAccess.is_mutating());
        assert!(!Lifecycle::Ignore.is_mutating());
        assert!(!Lifecycle::ExistsAndValidates.is_mutating());
        assert!(!Lifecycle::ExistsAndWarnIfChanges.is_mutating());
    }

    #[test]
    fn existing_lifecycles() {
        let existing: Vec<_> = Lifecycle::ALL
            .into_iter()
            .filter(|l| l.requires_existing())
            .collect();
        assert_eq!(
            existing,
            vec![Lifecycle::ExistsAndValidates, Lifecycle::ExistsAndWarnIfChanges]
        );
    }

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!(
            "Exists-And-Validates".parse::<Lifecycle>().unwrap(),
            Lifecycle::ExistsAndValidates
        );
        assert_eq!("sync".parse::<Lifecycle>().unwrap(), Lifecycle::Sync);
        assert!(matches!(
            "sometimes".parse::<Lifecycle>(),
            Err(CoreError::UnknownLifecycle(_))
        ));
    }

    #[test]
    fn display_matches_serde() {
        for lifecycle in Lifecycle::ALL {
            let json = serde_json::to_string(&lifecycle).unwrap();
            assert_eq!(json, format!("\"{lifecycle}\""));
        }
    }
}
