//! Engine loader registry.
//!
//! Maps engine identifiers to loaders that turn a scene `world` element into
//! a live [`EngineInstance`](multiworld_kernel::EngineInstance), and waits for
//! every new world to become discoverable before the next one is created so
//! the discovery order matches the request order.
//!
//! Failure policy is asymmetric on purpose: an engine that cannot be
//! supported is skipped while building the registry, but a named world that
//! fails to load aborts the whole batch.

mod discovery;
mod loader;
mod registry;

pub use discovery::{DiscoveryConfig, wait_for_discoverable};
pub use loader::{SimWorldLoader, WorldLoader};
pub use registry::{LoaderRegistry, WorldFile};

use multiworld_kernel::KernelError;
use multiworld_scene::SceneError;
use std::path::PathBuf;

/// Broad classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    NotFound,
    Unsupported,
    ParseFailure,
    Timeout,
    Configuration,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to find file [{}]", .0.display())]
    NotFound(PathBuf),
    #[error("engine '{engine}' is not supported")]
    Unsupported { engine: String },
    #[error("no loader registered for engine '{0}'")]
    UnknownEngine(String),
    #[error("could not load world: {0}")]
    ParseFailure(String),
    #[error("namespace of world '{world}' was not discovered in time")]
    Timeout { world: String },
    #[error("no physics engine could be registered")]
    NoEngines,
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::NotFound(_) => LoadErrorKind::NotFound,
            Self::Unsupported { .. } | Self::UnknownEngine(_) => LoadErrorKind::Unsupported,
            Self::ParseFailure(_) => LoadErrorKind::ParseFailure,
            Self::Timeout { .. } => LoadErrorKind::Timeout,
            Self::NoEngines => LoadErrorKind::Configuration,
        }
    }
}

impl From<SceneError> for LoadError {
    fn from(e: SceneError) -> Self {
        match e {
            SceneError::NotFound(path) => Self::NotFound(path),
            other => Self::ParseFailure(other.to_string()),
        }
    }
}

impl From<KernelError> for LoadError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Unsupported { engine } => Self::Unsupported { engine },
            KernelError::Scene(scene) => scene.into(),
            other => Self::ParseFailure(other.to_string()),
        }
    }
}
