//! Scene descriptors: a hierarchical element tree plus scene file reading.
//!
//! Scene files are YAML documents with an `sdf` root holding one `world`.
//! Entity descriptors travel between worlds as serialized subtrees.
//!
//! # Invariants
//! - The tree is opaque to the rest of the workspace beyond get/set by tag.

mod element;
mod file;

pub use element::SceneElement;
pub use file::{
    DEFAULT_ENGINE, RESOURCE_PATH_ENV, declared_engine, empty_world, locate, locate_in,
    override_physics, read_physics, read_world, set_world_name, world_name,
};

use std::path::PathBuf;

/// Errors from reading or interpreting scene descriptors.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("unable to find file [{0}]")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse scene: {0}")]
    Parse(String),
    #[error("no <{0}> element")]
    MissingElement(&'static str),
    #[error("invalid value for <{tag}>: '{value}'")]
    InvalidValue { tag: String, value: String },
}
