//! World kernel: the engine instance contract and a reference binding.
//!
//! # Invariants
//! - An instance is bound to exactly one engine for its whole life.
//! - Entities are addressed by name; the apply primitive must materialize
//!   every entity a snapshot names, or report which one it could not find.
//! - Freshly inserted entities take the pose declared by their descriptor;
//!   callers that need the snapshot pose must re-assert it.

mod engine;
pub mod world;

pub use engine::{Engine, PhysicsParams};
pub use world::{SimWorld, WorldEvent};

use multiworld_scene::SceneError;
use multiworld_state::{EntityState, Snapshot};

/// Errors from interpreting a single entity descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("<{0}> has no name attribute")]
    MissingName(String),
    #[error("unsupported entity <{0}>")]
    UnknownKind(String),
}

/// Errors from building a world instance.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("physics engine '{engine}' is not supported")]
    Unsupported { engine: String },
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("entity '{0}' declared twice")]
    DuplicateEntity(String),
}

/// Errors from the apply primitive.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("descriptor is not wrapped in a versioned envelope: {0}")]
    MissingEnvelope(String),
    #[error("descriptor envelope version {found}, expected {expected}")]
    VersionMismatch { found: String, expected: String },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("entity '{0}' not found after apply")]
    EntityNotFound(String),
}

/// One live, steppable world bound to one engine.
pub trait EngineInstance: Send {
    /// Instance name; also its discovery namespace.
    fn name(&self) -> &str;

    /// Identifier of the engine this instance is bound to.
    fn engine_id(&self) -> &str;

    fn capture_snapshot(&self) -> Snapshot;

    /// Bring the instance into the state described by `snapshot`.
    ///
    /// Processes the pending deletions and insertions, updates existing
    /// entities and adopts the snapshot clock. Fails if any entity named by
    /// the snapshot does not exist afterwards.
    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), ApplyError>;

    /// Advance `steps` iterations. A paused instance does not advance.
    fn step(&mut self, steps: u32);

    fn is_paused(&self) -> bool;

    fn set_paused(&mut self, paused: bool);

    fn entity(&self, name: &str) -> Option<EntityState>;

    /// Force an entity's motion state and republish its pose.
    fn set_entity_state(&mut self, state: &EntityState) -> Result<(), ApplyError>;
}
