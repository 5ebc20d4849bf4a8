use multiworld_common::{EntityKind, Pose, Twist, WorldTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// State of one model or light at the instant of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub name: String,
    pub kind: EntityKind,
    pub pose: Pose,
    pub velocity: Twist,
    /// Poses of nested parts (links) of a composite model, keyed by part name.
    pub parts: BTreeMap<String, Pose>,
    /// Serialized descriptor. Only consulted when the entity is inserted or
    /// deleted, never for plain updates.
    pub descriptor: String,
}

impl EntityState {
    /// Entity at rest with no parts and an empty descriptor.
    pub fn new(name: impl Into<String>, kind: EntityKind, pose: Pose) -> Self {
        Self {
            name: name.into(),
            kind,
            pose,
            velocity: Twist::default(),
            parts: BTreeMap::new(),
            descriptor: String::new(),
        }
    }

    pub fn model(name: impl Into<String>, pose: Pose) -> Self {
        Self::new(name, EntityKind::Model, pose)
    }

    pub fn light(name: impl Into<String>, pose: Pose) -> Self {
        Self::new(name, EntityKind::Light, pose)
    }

    pub fn with_velocity(mut self, velocity: Twist) -> Self {
        self.velocity = velocity;
        self
    }

    /// Add the pose of a nested part, such as a link of a model.
    pub fn with_part(mut self, name: impl Into<String>, pose: Pose) -> Self {
        self.parts.insert(name.into(), pose);
        self
    }

    /// Attach the serialized descriptor used when inserting or deleting.
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// Whether pose, velocity and part poses are all identical.
    pub fn same_motion(&self, other: &EntityState) -> bool {
        self.pose == other.pose && self.velocity == other.velocity && self.parts == other.parts
    }
}

/// Full state of one world at an instant, plus the pending insertions and
/// deletions an apply should carry out.
///
/// Captured snapshots never have pending changes; a merge fills them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the world this snapshot describes.
    pub world: String,
    pub time: WorldTime,
    /// Entities keyed by name.
    pub entities: BTreeMap<String, EntityState>,
    /// Descriptors of entities to materialize on apply.
    pub insertions: Vec<String>,
    /// Descriptors of entities to remove on apply.
    pub deletions: Vec<String>,
}

impl Snapshot {
    /// Empty snapshot of `world` taken at `time`.
    pub fn new(world: impl Into<String>, time: WorldTime) -> Self {
        Self {
            world: world.into(),
            time,
            ..Default::default()
        }
    }

    /// Builder form of [`Snapshot::insert`].
    pub fn with_entity(mut self, state: EntityState) -> Self {
        self.insert(state);
        self
    }

    /// Add or replace an entity, keyed by its name.
    pub fn insert(&mut self, state: EntityState) -> Option<EntityState> {
        self.entities.insert(state.name.clone(), state)
    }

    /// Entity called `name`, if present.
    pub fn get(&self, name: &str) -> Option<&EntityState> {
        self.entities.get(name)
    }

    /// Whether an entity called `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entity names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Entities of this snapshot whose names are absent from `other`.
    pub fn entities_missing_from<'a>(&'a self, other: &Snapshot) -> Vec<&'a EntityState> {
        self.entities
            .values()
            .filter(|e| !other.contains(&e.name))
            .collect()
    }

    /// Whether an apply of this snapshot would insert or delete entities.
    pub fn has_pending_changes(&self) -> bool {
        !self.insertions.is_empty() || !self.deletions.is_empty()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## State of world {}", self.world)?;
        writeln!(f, "  time: {}", self.time)?;
        for e in self.entities.values() {
            write!(f, "  {} '{}' {}", e.kind.tag(), e.name, e.pose)?;
            if !e.velocity.is_zero() {
                let v = e.velocity.linear;
                write!(f, " vel=({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)?;
            }
            if !e.parts.is_empty() {
                write!(f, " parts={}", e.parts.len())?;
            }
            writeln!(f)?;
        }
        if self.has_pending_changes() {
            writeln!(
                f,
                "  pending: {} insertions, {} deletions",
                self.insertions.len(),
                self.deletions.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn entities_keyed_by_name() {
        let mut snap = Snapshot::new("w", WorldTime::default());
        assert!(snap.insert(EntityState::model("a", Pose::default())).is_none());
        let replaced = snap.insert(EntityState::model("a", Pose::from_position(Vec3::X)));
        assert!(replaced.is_some());
        assert_eq!(snap.entity_count(), 1);
        assert_eq!(snap.get("a").unwrap().pose.position, Vec3::X);
    }

    #[test]
    fn missing_from_other() {
        let a = Snapshot::new("a", WorldTime::default())
            .with_entity(EntityState::model("x", Pose::default()))
            .with_entity(EntityState::light("sun", Pose::default()));
        let b = Snapshot::new("b", WorldTime::default())
            .with_entity(EntityState::model("x", Pose::default()));
        let missing: Vec<&str> = a
            .entities_missing_from(&b)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(missing, vec!["sun"]);
        assert!(b.entities_missing_from(&a).is_empty());
    }

    #[test]
    fn same_motion_checks_parts() {
        let a = EntityState::model("m", Pose::default()).with_part("link", Pose::default());
        let b = a.clone().with_part("link", Pose::from_position(Vec3::Z));
        assert!(a.same_motion(&a.clone()));
        assert!(!a.same_motion(&b));
    }

    #[test]
    fn display_lists_entities() {
        let snap = Snapshot::new("default", WorldTime::default())
            .with_entity(EntityState::model("box", Pose::default()));
        let s = format!("{snap}");
        assert!(s.starts_with("## State of world default"));
        assert!(s.contains("model 'box'"));
        assert!(s.contains("iterations=0"));
    }
}
