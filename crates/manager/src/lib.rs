//! Multi-world manager.
//!
//! Owns every live world plus an optional mirror, steps the worlds side by
//! side and keeps the mirror synchronized with one of them.
//!
//! # Lifecycle
//! `Unloaded -> Loaded -> Running <-> Paused -> Stopped`. Leaving `Loaded`
//! and `Paused` needs an explicit unpause, from the control channel or one
//! line on the console. Pausing while `Loaded` pauses the worlds but keeps
//! the state.

mod config;
mod gate;
mod manager;

pub use config::{ConfigError, ServerConfig};
pub use gate::{PauseGate, StopHandle};
pub use manager::WorldManager;

use multiworld_mirror::SyncError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unloaded,
    Loaded,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("mirror synchronization failed: {0}")]
    Sync(#[from] SyncError),
    #[error("no world at index {index} ({count} loaded)")]
    NoSuchWorld { index: usize, count: usize },
    #[error("manager has been stopped")]
    Stopped,
    #[error("no worlds loaded")]
    NotLoaded,
}
