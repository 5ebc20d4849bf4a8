//! World state: snapshots, differential deltas and descriptor envelopes.
//!
//! # Invariants
//! - Entity identity is the name string. Engine bindings assign their own
//!   internal handles, so the name is the only key stable across engines.
//! - Within one diff, every entity name is exactly one of inserted, deleted,
//!   updated or unchanged.
//! - Merging never touches clock fields; whether time advanced is a caller
//!   decision.

mod descriptor;
mod diff;
mod snapshot;

pub use descriptor::{ENVELOPE_VERSION, normalize, normalize_all};
pub use diff::{Change, Delta, EntityUpdate, diff, merge};
pub use snapshot::{EntityState, Snapshot};
