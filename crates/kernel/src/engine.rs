use crate::KernelError;
use glam::{Quat, Vec3};
use multiworld_common::{Pose, Twist};
use multiworld_scene::{SceneElement, SceneError};
use std::time::Duration;

/// Physics engines this binding can run a world with.
///
/// Engines differ in their integration scheme only, which is enough for the
/// same scene to drift apart when run side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// Semi-implicit Euler.
    Ode,
    /// Velocity Verlet.
    Bullet,
    /// Explicit Euler.
    Dart,
}

impl Engine {
    pub const SUPPORTED: [Engine; 3] = [Engine::Ode, Engine::Bullet, Engine::Dart];

    pub fn from_id(id: &str) -> Result<Self, KernelError> {
        Self::SUPPORTED
            .into_iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| KernelError::Unsupported {
                engine: id.to_string(),
            })
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Ode => "ode",
            Self::Bullet => "bullet",
            Self::Dart => "dart",
        }
    }

    /// Advance one body by `dt` under constant acceleration `gravity`.
    pub fn integrate(self, pose: &mut Pose, twist: &mut Twist, gravity: Vec3, dt: f32) {
        match self {
            Self::Ode => {
                twist.linear += gravity * dt;
                pose.position += twist.linear * dt;
            }
            Self::Bullet => {
                pose.position += twist.linear * dt + 0.5 * gravity * dt * dt;
                twist.linear += gravity * dt;
            }
            Self::Dart => {
                pose.position += twist.linear * dt;
                twist.linear += gravity * dt;
            }
        }
        if twist.angular != Vec3::ZERO {
            pose.rotation = (Quat::from_scaled_axis(twist.angular * dt) * pose.rotation).normalize();
        }
    }
}

/// Stepping parameters read from a world's `physics` element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    /// Simulated time per iteration.
    pub step_size: Duration,
    pub gravity: Vec3,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            step_size: Duration::from_millis(1),
            gravity: Vec3::new(0.0, 0.0, -9.8),
        }
    }
}

impl PhysicsParams {
    pub fn from_element(physics: Option<&SceneElement>) -> Result<Self, SceneError> {
        let mut params = Self::default();
        let Some(physics) = physics else {
            return Ok(params);
        };
        if let Some(step) = physics.f64_child("max_step_size")? {
            params.step_size = Duration::try_from_secs_f64(step)
                .ok()
                .filter(|d| step.is_finite() && !d.is_zero())
                .ok_or_else(|| SceneError::InvalidValue {
                    tag: "max_step_size".into(),
                    value: step.to_string(),
                })?;
        }
        if let Some(gravity) = physics.vec3_child("gravity")? {
            params.gravity = gravity;
        }
        Ok(params)
    }

    /// Physics element declaring `engine` with these parameters.
    pub fn to_element(&self, engine: Engine) -> SceneElement {
        let g = self.gravity;
        SceneElement::new("physics")
            .with_attribute("type", engine.id())
            .with_child(SceneElement::new("max_step_size").with_text(self.step_size.as_secs_f64().to_string()))
            .with_child(SceneElement::new("gravity").with_text(format!("{} {} {}", g.x, g.y, g.z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_ids() {
        assert_eq!(Engine::from_id("bullet").unwrap(), Engine::Bullet);
        assert!(matches!(
            Engine::from_id("simbody"),
            Err(KernelError::Unsupported { .. })
        ));
    }

    #[test]
    fn engines_diverge_on_first_step() {
        let g = Vec3::new(0.0, 0.0, -10.0);
        let drop = |engine: Engine| {
            let mut pose = Pose::default();
            let mut twist = Twist::default();
            engine.integrate(&mut pose, &mut twist, g, 0.1);
            (pose.position.z, twist.linear.z)
        };
        let (ode_z, ode_v) = drop(Engine::Ode);
        let (bullet_z, _) = drop(Engine::Bullet);
        let (dart_z, dart_v) = drop(Engine::Dart);
        assert!((ode_z + 0.1).abs() < 1e-6);
        assert!((bullet_z + 0.05).abs() < 1e-6);
        assert_eq!(dart_z, 0.0);
        assert_eq!(ode_v, dart_v);
    }

    #[test]
    fn physics_params_roundtrip_through_element() {
        let params = PhysicsParams {
            step_size: Duration::from_millis(4),
            gravity: Vec3::new(0.0, 0.0, -1.6),
        };
        let element = params.to_element(Engine::Dart);
        assert_eq!(element.attribute("type"), Some("dart"));
        assert_eq!(PhysicsParams::from_element(Some(&element)).unwrap(), params);
    }

    #[test]
    fn rejects_unusable_steps() {
        for text in ["0", "-0.01", "NaN", "inf", "-inf", "1e300"] {
            let element = SceneElement::new("physics")
                .with_child(SceneElement::new("max_step_size").with_text(text));
            assert!(
                matches!(
                    PhysicsParams::from_element(Some(&element)),
                    Err(SceneError::InvalidValue { .. })
                ),
                "max_step_size {text} accepted"
            );
        }
    }
}
