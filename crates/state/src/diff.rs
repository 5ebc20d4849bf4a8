use crate::snapshot::{EntityState, Snapshot};
use multiworld_common::{Pose, Twist};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// New motion state for an entity present on both sides of a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub pose: Pose,
    pub velocity: Twist,
    pub parts: BTreeMap<String, Pose>,
}

impl EntityUpdate {
    fn of(state: &EntityState) -> Self {
        Self {
            pose: state.pose,
            velocity: state.velocity,
            parts: state.parts.clone(),
        }
    }

    fn apply_to(&self, state: &mut EntityState) {
        state.pose = self.pose;
        state.velocity = self.velocity;
        state.parts.clone_from(&self.parts);
    }
}

/// How a diff classified one entity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Inserted,
    Deleted,
    Updated,
}

/// Differences that turn one snapshot into another.
///
/// Inserted and deleted entities carry their full state, descriptor
/// included, so the delta can be applied in either direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Present in `to`, absent from `from`. Ordered by name.
    pub inserted: Vec<EntityState>,
    /// Present in `from`, absent from `to`. Ordered by name.
    pub deleted: Vec<EntityState>,
    /// Present in both with different motion state.
    pub updated: BTreeMap<String, EntityUpdate>,
}

impl Delta {
    /// True when both snapshots hold the same entities in the same state.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Raw descriptors of the inserted entities, in name order.
    pub fn inserted_descriptors(&self) -> Vec<String> {
        self.inserted.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Raw descriptors of the deleted entities, in name order.
    pub fn deleted_descriptors(&self) -> Vec<String> {
        self.deleted.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn deleted_names(&self) -> BTreeSet<&str> {
        self.deleted.iter().map(|e| e.name.as_str()).collect()
    }

    /// Classification of `name`, or `None` when it is unchanged or unknown.
    pub fn change_for(&self, name: &str) -> Option<Change> {
        if self.inserted.iter().any(|e| e.name == name) {
            Some(Change::Inserted)
        } else if self.deleted.iter().any(|e| e.name == name) {
            Some(Change::Deleted)
        } else if self.updated.contains_key(name) {
            Some(Change::Updated)
        } else {
            None
        }
    }
}

/// Compute the delta that turns `from` into `to`.
///
/// Entities with identical pose, velocity and part poses are omitted.
pub fn diff(from: &Snapshot, to: &Snapshot) -> Delta {
    let mut delta = Delta::default();
    for (name, target) in &to.entities {
        match from.get(name) {
            None => delta.inserted.push(target.clone()),
            Some(current) if !current.same_motion(target) => {
                delta.updated.insert(name.clone(), EntityUpdate::of(target));
            }
            Some(_) => {}
        }
    }
    delta.deleted = from
        .entities
        .values()
        .filter(|e| !to.contains(&e.name))
        .cloned()
        .collect();
    tracing::trace!(
        inserted = delta.inserted.len(),
        deleted = delta.deleted.len(),
        updated = delta.updated.len(),
        "diff computed"
    );
    delta
}

/// Apply `delta` on top of `base`, producing a new snapshot.
///
/// The result keeps `base`'s world name and clock. Inserted and deleted
/// descriptors are appended to the pending change lists so an apply can
/// materialize them. Deleting a name that `base` lacks is a no-op, as is an
/// update for an unknown name.
pub fn merge(base: &Snapshot, delta: &Delta) -> Snapshot {
    let mut merged = base.clone();
    for gone in &delta.deleted {
        if merged.entities.remove(&gone.name).is_some() {
            merged.deletions.push(gone.descriptor.clone());
        }
    }
    for added in &delta.inserted {
        merged.insertions.push(added.descriptor.clone());
        merged.insert(added.clone());
    }
    for (name, update) in &delta.updated {
        match merged.entities.get_mut(name) {
            Some(state) => update.apply_to(state),
            None => tracing::debug!(entity = %name, "update for unknown entity ignored"),
        }
    }
    merged
}
