use crate::engine::{Engine, PhysicsParams};
use crate::{ApplyError, DescriptorError, EngineInstance, KernelError};
use multiworld_common::{EntityKind, Pose, Twist, WorldTime};
use multiworld_scene::{SceneElement, declared_engine};
use multiworld_state::{ENVELOPE_VERSION, EntityState, Snapshot};
use multiworld_transport::DiscoveryBus;
use serde::Deserialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Notifications older than this are dropped from the log.
const EVENT_LOG_CAPACITY: usize = 4096;

/// Change notification published by a world.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Inserted { name: String },
    Deleted { name: String },
    PoseChanged { name: String, pose: Pose },
    Stepped { iterations: u64 },
}

#[derive(Debug, Clone)]
struct Body {
    kind: EntityKind,
    pose: Pose,
    velocity: Twist,
    parts: BTreeMap<String, Pose>,
    is_static: bool,
    descriptor: String,
}

impl Body {
    fn from_element(element: &SceneElement) -> Result<(String, Body), DescriptorError> {
        let kind = EntityKind::from_tag(&element.tag)
            .ok_or_else(|| DescriptorError::UnknownKind(element.tag.clone()))?;
        let name = element
            .attribute("name")
            .ok_or_else(|| DescriptorError::MissingName(element.tag.clone()))?
            .to_string();
        let mut parts = BTreeMap::new();
        for link in element.children_named("link") {
            let part = link
                .attribute("name")
                .ok_or_else(|| DescriptorError::MissingName(link.tag.clone()))?;
            parts.insert(part.to_string(), link.pose()?.unwrap_or_default());
        }
        let body = Body {
            kind,
            pose: element.pose()?.unwrap_or_default(),
            velocity: element.velocity()?.unwrap_or_default(),
            parts,
            is_static: kind == EntityKind::Light || element.bool_child("static")?.unwrap_or(false),
            descriptor: element.to_descriptor_string()?,
        };
        Ok((name, body))
    }

    fn state(&self, name: &str) -> EntityState {
        EntityState {
            name: name.to_string(),
            kind: self.kind,
            pose: self.pose,
            velocity: self.velocity,
            parts: self.parts.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    fn set_motion(&mut self, state: &EntityState) {
        self.pose = state.pose;
        self.velocity = state.velocity;
        self.parts.clone_from(&state.parts);
    }
}

#[derive(Deserialize)]
struct Envelope {
    sdf: String,
    element: SceneElement,
}

fn open_envelope(descriptor: &str) -> Result<SceneElement, ApplyError> {
    let envelope: Envelope = serde_json::from_str(descriptor)
        .map_err(|e| ApplyError::MissingEnvelope(e.to_string()))?;
    if envelope.sdf != ENVELOPE_VERSION {
        return Err(ApplyError::VersionMismatch {
            found: envelope.sdf,
            expected: ENVELOPE_VERSION.to_string(),
        });
    }
    Ok(envelope.element)
}

/// In-process world bound to one [`Engine`].
///
/// Entities live in a BTreeMap keyed by name for deterministic iteration.
/// Every mutation is recorded as a [`WorldEvent`].
#[derive(Debug)]
pub struct SimWorld {
    name: String,
    engine: Engine,
    physics: PhysicsParams,
    bodies: BTreeMap<String, Body>,
    time: WorldTime,
    paused: bool,
    clock_mark: Instant,
    events: VecDeque<WorldEvent>,
    discovery: Option<DiscoveryBus>,
    /// Guards advertisement against a concurrent drop.
    alive: Arc<Mutex<bool>>,
}

impl SimWorld {
    /// Build a world from a `world` element, bound to the engine its physics
    /// declares.
    pub fn from_scene(world: &SceneElement) -> Result<Self, KernelError> {
        let engine = Engine::from_id(declared_engine(world))?;
        let physics = PhysicsParams::from_element(world.child("physics"))?;
        let name = world.attribute("name").unwrap_or("default").to_string();

        let mut bodies = BTreeMap::new();
        for element in &world.children {
            if EntityKind::from_tag(&element.tag).is_none() {
                continue;
            }
            let (entity, body) = Body::from_element(element)?;
            if bodies.contains_key(&entity) {
                return Err(KernelError::DuplicateEntity(entity));
            }
            bodies.insert(entity, body);
        }
        tracing::debug!(world = %name, engine = engine.id(), entities = bodies.len(), "world built");

        Ok(Self {
            name,
            engine,
            physics,
            bodies,
            time: WorldTime::default(),
            paused: false,
            clock_mark: Instant::now(),
            events: VecDeque::new(),
            discovery: None,
            alive: Arc::new(Mutex::new(true)),
        })
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn physics(&self) -> PhysicsParams {
        self.physics
    }

    pub fn time(&self) -> WorldTime {
        self.time
    }

    pub fn entity_count(&self) -> usize {
        self.bodies.len()
    }

    /// Read-only access to the recorded notifications, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter()
    }

    /// Drain and return the recorded notifications.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.drain(..).collect()
    }

    /// Publish this world's namespace on `bus` from a background thread
    /// after `delay`. The namespace is withdrawn when the world is dropped.
    pub fn advertise(&mut self, bus: &DiscoveryBus, delay: Duration) {
        self.discovery = Some(bus.clone());
        let bus = bus.clone();
        let namespace = self.name.clone();
        let alive = Arc::clone(&self.alive);
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            let alive = alive.lock().unwrap_or_else(PoisonError::into_inner);
            if *alive {
                bus.advertise(&namespace);
            }
        });
    }

    fn record(&mut self, event: WorldEvent) {
        if self.events.len() == EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn advance_clocks(&mut self) {
        let now = Instant::now();
        self.time.real_time += now.saturating_duration_since(self.clock_mark);
        self.clock_mark = now;
        self.time.wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
    }

    fn step_once(&mut self) {
        let dt = self.physics.step_size.as_secs_f32();
        let gravity = self.physics.gravity;
        let mut moved = Vec::new();
        for (name, body) in self.bodies.iter_mut().filter(|(_, b)| !b.is_static) {
            let before = body.pose;
            self.engine
                .integrate(&mut body.pose, &mut body.velocity, gravity, dt);
            if body.pose != before {
                moved.push((name.clone(), body.pose));
            }
        }
        for (name, pose) in moved {
            self.record(WorldEvent::PoseChanged { name, pose });
        }
        self.time.sim_time += self.physics.step_size;
        self.time.iterations += 1;
        let iterations = self.time.iterations;
        self.record(WorldEvent::Stepped { iterations });
    }
}

impl EngineInstance for SimWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine_id(&self) -> &str {
        self.engine.id()
    }

    fn capture_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.name.clone(), self.time);
        for (name, body) in &self.bodies {
            snapshot.insert(body.state(name));
        }
        snapshot
    }

    /// Deletions run first, then updates to entities that already exist,
    /// then insertions. Inserted entities are built from their descriptor,
    /// so they take the descriptor's declared pose rather than the pose the
    /// snapshot holds for them, and only an `Inserted` notification is
    /// published for them.
    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), ApplyError> {
        let deletions = snapshot
            .deletions
            .iter()
            .map(|d| -> Result<String, ApplyError> {
                let element = open_envelope(d)?;
                let name = element
                    .attribute("name")
                    .ok_or_else(|| DescriptorError::MissingName(element.tag.clone()))?;
                Ok(name.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;
        let insertions = snapshot
            .insertions
            .iter()
            .map(|d| open_envelope(d).and_then(|e| Ok(Body::from_element(&e)?)))
            .collect::<Result<Vec<_>, _>>()?;

        for name in deletions {
            if self.bodies.remove(&name).is_some() {
                self.record(WorldEvent::Deleted { name });
            } else {
                tracing::debug!(world = %self.name, entity = %name, "deletion of absent entity ignored");
            }
        }

        let mut changed = Vec::new();
        for (name, state) in &snapshot.entities {
            if let Some(body) = self.bodies.get_mut(name) {
                let pose_changed = body.pose != state.pose;
                body.set_motion(state);
                if pose_changed {
                    changed.push((name.clone(), state.pose));
                }
            }
        }
        for (name, pose) in changed {
            self.record(WorldEvent::PoseChanged { name, pose });
        }

        for (name, body) in insertions {
            if self.bodies.contains_key(&name) {
                tracing::warn!(world = %self.name, entity = %name, "insertion of existing entity skipped");
                continue;
            }
            self.bodies.insert(name.clone(), body);
            self.record(WorldEvent::Inserted { name });
        }

        self.time = snapshot.time;

        match snapshot.names().find(|n| !self.bodies.contains_key(*n)) {
            Some(missing) => Err(ApplyError::EntityNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    fn step(&mut self, steps: u32) {
        if self.paused {
            tracing::trace!(world = %self.name, "paused, not stepping");
            return;
        }
        for _ in 0..steps {
            self.step_once();
        }
        self.advance_clocks();
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused && !paused {
            self.clock_mark = Instant::now();
        }
        self.paused = paused;
    }

    fn entity(&self, name: &str) -> Option<EntityState> {
        self.bodies.get(name).map(|b| b.state(name))
    }

    fn set_entity_state(&mut self, state: &EntityState) -> Result<(), ApplyError> {
        let body = self
            .bodies
            .get_mut(&state.name)
            .ok_or_else(|| ApplyError::EntityNotFound(state.name.clone()))?;
        body.set_motion(state);
        self.record(WorldEvent::PoseChanged {
            name: state.name.clone(),
            pose: state.pose,
        });
        Ok(())
    }
}

impl Drop for SimWorld {
    fn drop(&mut self) {
        let mut alive = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        *alive = false;
        if let Some(bus) = &self.discovery {
            bus.withdraw(&self.name);
        }
    }
}
