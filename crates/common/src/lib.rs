//! Shared value types used by every multiworld crate.
//!
//! # Invariants
//! - Entities are identified across engines by name only, never by an
//!   engine-internal handle.

mod types;

pub use types::{EntityKind, Pose, Twist, WorldTime};
