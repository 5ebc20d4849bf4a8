use crate::LoadError;
use multiworld_kernel::{Engine, EngineInstance, PhysicsParams, SimWorld};
use multiworld_scene::{SceneElement, override_physics, set_world_name};
use multiworld_transport::DiscoveryBus;
use std::time::Duration;

/// Capability to materialize a scene `world` element as a live instance.
pub trait WorldLoader: Send + Sync {
    /// Identifier of the engine new instances are bound to.
    fn engine(&self) -> &str;

    /// Build an instance from `world`, renamed to `name` when given.
    fn load(
        &self,
        world: SceneElement,
        name: Option<&str>,
    ) -> Result<Box<dyn EngineInstance>, LoadError>;
}

/// Loader for the in-process [`SimWorld`] binding.
///
/// An engine-bound loader replaces the world's physics with its own before
/// instantiation; the universal loader keeps whatever the world declares.
#[derive(Debug, Clone)]
pub struct SimWorldLoader {
    engine: Option<Engine>,
    physics: Option<SceneElement>,
    bus: DiscoveryBus,
    advertise_delay: Duration,
}

impl SimWorldLoader {
    pub fn new(engine_id: &str, bus: DiscoveryBus) -> Result<Self, LoadError> {
        let engine = Engine::from_id(engine_id)?;
        Ok(Self {
            engine: Some(engine),
            physics: Some(PhysicsParams::default().to_element(engine)),
            bus,
            advertise_delay: Duration::ZERO,
        })
    }

    /// Loader that uses the engine declared by each world.
    pub fn universal(bus: DiscoveryBus) -> Self {
        Self {
            engine: None,
            physics: None,
            bus,
            advertise_delay: Duration::ZERO,
        }
    }

    /// Delay between instantiation and namespace advertisement.
    pub fn with_advertise_delay(mut self, delay: Duration) -> Self {
        self.advertise_delay = delay;
        self
    }

    /// Use `physics` parameters instead of the engine defaults. The engine
    /// type stays this loader's own.
    pub fn with_physics(mut self, physics: &SceneElement) -> Self {
        if let Some(engine) = self.engine {
            let mut physics = physics.clone();
            physics.set_attribute("type", engine.id());
            self.physics = Some(physics);
        }
        self
    }
}

impl WorldLoader for SimWorldLoader {
    fn engine(&self) -> &str {
        self.engine.map_or("auto", Engine::id)
    }

    fn load(
        &self,
        mut world: SceneElement,
        name: Option<&str>,
    ) -> Result<Box<dyn EngineInstance>, LoadError> {
        if let Some(physics) = &self.physics {
            override_physics(&mut world, physics);
        }
        if let Some(name) = name {
            set_world_name(&mut world, name);
        }
        let mut instance = SimWorld::from_scene(&world)?;
        instance.advertise(&self.bus, self.advertise_delay);
        tracing::info!(
            world = instance.name(),
            engine = instance.engine_id(),
            entities = instance.entity_count(),
            "world loaded"
        );
        Ok(Box::new(instance))
    }
}
