use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether an entity is a model or a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Model,
    Light,
}

impl EntityKind {
    /// Descriptor tag used for this kind of entity.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Light => "light",
        }
    }

    /// Map a descriptor tag back to a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "model" => Some(Self::Model),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

/// Position and orientation of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with identity orientation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Build a pose from fixed-axis roll, pitch and yaw (radians), the
    /// convention used by scene descriptors.
    pub fn from_xyz_rpy(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            rotation: Quat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
        }
    }

    /// Roll, pitch and yaw of the orientation.
    pub fn rpy(&self) -> [f32; 3] {
        let (yaw, pitch, roll) = self.rotation.to_euler(EulerRot::ZYX);
        [roll, pitch, yaw]
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position;
        let [roll, pitch, yaw] = self.rpy();
        write!(
            f,
            "pos=({:.3}, {:.3}, {:.3}) rpy=({:.3}, {:.3}, {:.3})",
            p.x, p.y, p.z, roll, pitch, yaw
        )
    }
}

/// Linear and angular velocity of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Twist {
    pub fn linear(linear: Vec3) -> Self {
        Self {
            linear,
            angular: Vec3::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear == Vec3::ZERO && self.angular == Vec3::ZERO
    }
}

/// Clock state of a world at the instant a snapshot was captured.
///
/// All counters are monotonic over the life of a world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTime {
    /// Simulated time.
    pub sim_time: Duration,
    /// Real time elapsed while the world was running.
    pub real_time: Duration,
    /// Wall clock (since the unix epoch) at the last step.
    pub wall_time: Duration,
    /// Number of completed simulation iterations.
    pub iterations: u64,
}

impl fmt::Display for WorldTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sim={:.4}s real={:.4}s wall={:.3}s iterations={}",
            self.sim_time.as_secs_f64(),
            self.real_time.as_secs_f64(),
            self.wall_time.as_secs_f64(),
            self.iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_default_is_identity() {
        let p = Pose::default();
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.rotation, Quat::IDENTITY);
    }

    #[test]
    fn rpy_roundtrip() {
        let p = Pose::from_xyz_rpy(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let [r, pi, y] = p.rpy();
        assert!((r - 0.1).abs() < 1e-5);
        assert!((pi - 0.2).abs() < 1e-5);
        assert!((y - 0.3).abs() < 1e-5);
    }

    #[test]
    fn kind_tags() {
        assert_eq!(EntityKind::from_tag("model"), Some(EntityKind::Model));
        assert_eq!(EntityKind::from_tag(EntityKind::Light.tag()), Some(EntityKind::Light));
        assert_eq!(EntityKind::from_tag("actor"), None);
    }

    #[test]
    fn twist_zero() {
        assert!(Twist::default().is_zero());
        assert!(!Twist::linear(Vec3::X).is_zero());
    }
}
