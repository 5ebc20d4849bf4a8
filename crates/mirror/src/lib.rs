//! Mirror synchronization: bring a live world into the state of a target
//! snapshot as one externally observable step.
//!
//! # Invariants
//! - Observers of the mirror see either the force-paused state or the fully
//!   synchronized one, never a half-applied world.
//! - Entities new to the mirror are re-asserted at their target pose after
//!   apply, since the apply primitive does not republish them.
//! - A post-apply lookup failure is fatal and leaves the mirror paused.

mod sync;

pub use sync::{SyncReport, sync_to};

use multiworld_kernel::ApplyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which clock the mirror keeps after a synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePolicy {
    /// Adopt the target's clock.
    #[default]
    #[serde(rename = "target")]
    UseTarget,
    /// Keep the mirror's own clock.
    #[serde(rename = "current")]
    UseCurrent,
}

impl fmt::Display for TimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UseTarget => "target",
            Self::UseCurrent => "current",
        })
    }
}

impl FromStr for TimePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "target" => Ok(Self::UseTarget),
            "current" => Ok(Self::UseCurrent),
            other => Err(format!("unknown time policy '{other}' (expected target or current)")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),
    /// The apply primitive did not materialize an inserted entity.
    #[error("entity '{name}' missing from mirror after apply")]
    MissingAfterApply { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_policy_parses() {
        assert_eq!("target".parse::<TimePolicy>().unwrap(), TimePolicy::UseTarget);
        assert_eq!("current".parse::<TimePolicy>().unwrap(), TimePolicy::UseCurrent);
        assert!("now".parse::<TimePolicy>().is_err());
        assert_eq!(TimePolicy::default().to_string(), "target");
    }
}
