use crate::discovery::{DiscoveryConfig, wait_for_discoverable};
use crate::loader::{SimWorldLoader, WorldLoader};
use crate::LoadError;
use multiworld_kernel::EngineInstance;
use multiworld_scene::{SceneElement, declared_engine, read_world};
use multiworld_transport::DiscoveryBus;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One entry of a batch load: a scene file and the name its world gets.
/// An empty name keeps the world's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldFile {
    pub path: PathBuf,
    pub name: String,
}

impl WorldFile {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

pub struct LoaderRegistry {
    loaders: BTreeMap<String, Box<dyn WorldLoader>>,
    universal: SimWorldLoader,
    bus: DiscoveryBus,
    discovery: DiscoveryConfig,
}

impl LoaderRegistry {
    /// Empty registry. Worlds are discovered on `bus`.
    pub fn new(bus: DiscoveryBus, discovery: DiscoveryConfig) -> Self {
        Self {
            loaders: BTreeMap::new(),
            universal: SimWorldLoader::universal(bus.clone()),
            bus,
            discovery,
        }
    }

    /// Register a [`SimWorldLoader`] for each engine id, skipping engines
    /// that cannot be supported. Fails only when none could be registered.
    ///
    /// `physics`, when given, replaces every loader's default parameters.
    pub fn build(
        engine_ids: &[&str],
        bus: DiscoveryBus,
        discovery: DiscoveryConfig,
        physics: Option<&SceneElement>,
    ) -> Result<Self, LoadError> {
        let mut registry = Self::new(bus, discovery);
        for &id in engine_ids {
            match SimWorldLoader::new(id, registry.bus.clone()) {
                Ok(loader) => {
                    let loader = match physics {
                        Some(physics) => loader.with_physics(physics),
                        None => loader,
                    };
                    registry.register(id, Box::new(loader));
                }
                Err(e) => tracing::warn!(engine = id, "engine skipped: {e}"),
            }
        }
        if registry.loaders.is_empty() {
            return Err(LoadError::NoEngines);
        }
        tracing::info!(engines = ?registry.engines(), "loader registry built");
        Ok(registry)
    }

    /// Associate `engine_id` with `loader`, replacing any previous one.
    pub fn register(&mut self, engine_id: impl Into<String>, loader: Box<dyn WorldLoader>) {
        self.loaders.insert(engine_id.into(), loader);
    }

    /// Registered engine ids, sorted.
    pub fn engines(&self) -> Vec<&str> {
        self.loaders.keys().map(String::as_str).collect()
    }

    pub fn bus(&self) -> &DiscoveryBus {
        &self.bus
    }

    fn instantiate(
        &self,
        loader: &dyn WorldLoader,
        world: SceneElement,
        name: Option<&str>,
    ) -> Result<Box<dyn EngineInstance>, LoadError> {
        let instance = loader.load(world, name)?;
        let namespace = instance.name().to_string();
        if !wait_for_discoverable(
            &self.bus,
            &namespace,
            self.discovery.max_wait,
            self.discovery.poll_interval,
        ) {
            return Err(LoadError::Timeout { world: namespace });
        }
        Ok(instance)
    }

    /// One independent world per requested engine, each named
    /// `<prefix>_<engine>`. Engines without a loader, and engines that fail
    /// to instantiate the world, are skipped.
    pub fn load_explicit(
        &self,
        world: &SceneElement,
        engine_ids: &[&str],
        prefix: &str,
    ) -> Vec<Box<dyn EngineInstance>> {
        let mut worlds = Vec::with_capacity(engine_ids.len());
        for &id in engine_ids {
            let Some(loader) = self.loaders.get(id) else {
                tracing::warn!(engine = id, "no loader registered, skipping");
                continue;
            };
            let name = format!("{prefix}_{id}");
            match self.instantiate(&**loader, world.clone(), Some(&name)) {
                Ok(instance) => worlds.push(instance),
                Err(e) => tracing::warn!(world = %name, engine = id, "could not load world: {e}"),
            }
        }
        worlds
    }

    /// Instantiate `world` with the engine it declares. With a prefix the
    /// world is named `<prefix>_<engine>`, otherwise it keeps its own name.
    pub fn load_auto(
        &self,
        world: SceneElement,
        prefix: Option<&str>,
    ) -> Result<Box<dyn EngineInstance>, LoadError> {
        let name = prefix.map(|p| format!("{p}_{}", declared_engine(&world)));
        self.instantiate(&self.universal, world, name.as_deref())
    }

    pub fn load_explicit_file(
        &self,
        path: impl AsRef<Path>,
        engine_ids: &[&str],
        prefix: &str,
    ) -> Result<Vec<Box<dyn EngineInstance>>, LoadError> {
        let world = read_world(path, None)?;
        Ok(self.load_explicit(&world, engine_ids, prefix))
    }

    pub fn load_auto_file(
        &self,
        path: impl AsRef<Path>,
        prefix: Option<&str>,
    ) -> Result<Box<dyn EngineInstance>, LoadError> {
        let world = read_world(path, None)?;
        self.load_auto(world, prefix)
    }

    /// Load every file in order with its declared engine. Any failure
    /// discards the worlds already loaded and fails the batch.
    pub fn load_all(&self, files: &[WorldFile]) -> Result<Vec<Box<dyn EngineInstance>>, LoadError> {
        let mut worlds = Vec::with_capacity(files.len());
        for file in files {
            tracing::info!(file = %file.path.display(), name = %file.name, "loading world");
            let loaded = read_world(&file.path, Some(file.name.as_str()))
                .map_err(LoadError::from)
                .and_then(|world| self.instantiate(&self.universal, world, None));
            match loaded {
                Ok(world) => worlds.push(world),
                Err(e) => {
                    tracing::error!(file = %file.path.display(), "could not load world: {e}");
                    return Err(e);
                }
            }
        }
        Ok(worlds)
    }
}
