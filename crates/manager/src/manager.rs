use crate::gate::{PauseGate, StopHandle};
use crate::{Lifecycle, ManagerError, ServerConfig};
use multiworld_kernel::EngineInstance;
use multiworld_mirror::{TimePolicy, sync_to};
use multiworld_transport::ControlChannel;
use std::io::BufRead;
use std::thread;

pub struct WorldManager {
    worlds: Vec<Box<dyn EngineInstance>>,
    mirror: Option<Box<dyn EngineInstance>>,
    mirrored: usize,
    time_policy: TimePolicy,
    state: Lifecycle,
    gate: PauseGate,
    stop: StopHandle,
}

impl WorldManager {
    pub fn new(time_policy: TimePolicy) -> Self {
        Self {
            worlds: Vec::new(),
            mirror: None,
            mirrored: 0,
            time_policy,
            state: Lifecycle::Unloaded,
            gate: PauseGate::new(),
            stop: StopHandle::default(),
        }
    }

    /// Accept pause requests from `channel`.
    pub fn attach_control(&self, channel: &ControlChannel) {
        self.gate.attach(channel);
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    pub fn world(&self, index: usize) -> Option<&dyn EngineInstance> {
        self.worlds.get(index).map(|w| &**w)
    }

    pub fn worlds(&self) -> impl Iterator<Item = &dyn EngineInstance> {
        self.worlds.iter().map(|w| &**w)
    }

    pub fn mirror(&self) -> Option<&dyn EngineInstance> {
        self.mirror.as_deref()
    }

    pub fn mirrored_world(&self) -> usize {
        self.mirrored
    }

    pub fn add_world(&mut self, world: Box<dyn EngineInstance>) -> Result<(), ManagerError> {
        if self.state == Lifecycle::Stopped {
            return Err(ManagerError::Stopped);
        }
        tracing::debug!(world = world.name(), index = self.worlds.len(), "world added");
        self.worlds.push(world);
        if self.state == Lifecycle::Unloaded {
            self.state = Lifecycle::Loaded;
        }
        Ok(())
    }

    pub fn set_mirror(&mut self, mirror: Box<dyn EngineInstance>) -> Result<(), ManagerError> {
        if self.state == Lifecycle::Stopped {
            return Err(ManagerError::Stopped);
        }
        tracing::info!(mirror = mirror.name(), "mirror installed");
        self.mirror = Some(mirror);
        Ok(())
    }

    /// Choose which world the mirror follows.
    pub fn set_mirrored_world(&mut self, index: usize) -> Result<(), ManagerError> {
        if index >= self.worlds.len() {
            return Err(ManagerError::NoSuchWorld {
                index,
                count: self.worlds.len(),
            });
        }
        self.mirrored = index;
        Ok(())
    }

    /// Pause or unpause every world, the mirror included.
    ///
    /// Pausing before the first unpause keeps the manager `Loaded`.
    pub fn set_paused(&mut self, paused: bool) {
        for world in self.worlds.iter_mut().chain(self.mirror.iter_mut()) {
            world.set_paused(paused);
        }
        self.state = match (self.state, paused) {
            (Lifecycle::Running, true) => Lifecycle::Paused,
            (Lifecycle::Loaded | Lifecycle::Paused, false) => Lifecycle::Running,
            (state, _) => state,
        };
    }

    /// Advance every world by `steps` and then synchronize the mirror.
    ///
    /// Worlds step on their own threads; the call returns once all of them
    /// have finished.
    pub fn update(&mut self, steps: u32) -> Result<(), ManagerError> {
        if self.state == Lifecycle::Stopped {
            return Err(ManagerError::Stopped);
        }
        if self.worlds.is_empty() {
            return Err(ManagerError::NotLoaded);
        }
        if let [world] = self.worlds.as_mut_slice() {
            world.step(steps);
        } else {
            thread::scope(|scope| {
                for world in &mut self.worlds {
                    scope.spawn(move || world.step(steps));
                }
            });
        }
        self.sync_mirror()
    }

    fn sync_mirror(&mut self) -> Result<(), ManagerError> {
        let Some(mirror) = self.mirror.as_mut() else {
            return Ok(());
        };
        let target = self
            .worlds
            .get(self.mirrored)
            .ok_or(ManagerError::NoSuchWorld {
                index: self.mirrored,
                count: self.worlds.len(),
            })?
            .capture_snapshot();
        sync_to(&mut **mirror, &target, self.time_policy)?;
        Ok(())
    }

    /// Drive the load/step/synchronize loop.
    ///
    /// Starts paused and waits for an unpause. While running, a pause request
    /// pauses every world and waits again. `console` supplies the reader
    /// watched during each wait, `None` for no console. Returns the number of
    /// completed iterations once `max_iterations` is reached or the stop
    /// handle fires; a stop request also releases every world.
    pub fn run<F, R>(&mut self, config: &ServerConfig, mut console: F) -> Result<u64, ManagerError>
    where
        F: FnMut() -> Option<R>,
        R: BufRead + Send + 'static,
    {
        if self.state == Lifecycle::Stopped {
            return Err(ManagerError::Stopped);
        }
        if self.worlds.is_empty() {
            return Err(ManagerError::NotLoaded);
        }
        self.set_paused(true);

        let mut iterations = 0u64;
        while !self.stop.is_stopped() {
            if config.max_iterations.is_some_and(|max| iterations >= max) {
                return Ok(iterations);
            }
            if self.state != Lifecycle::Running || !self.gate.is_unpaused() {
                self.set_paused(true);
                if !self.gate.is_unpaused() {
                    tracing::info!("paused; press [Enter] or send an unpause request to continue");
                    if let Some(reader) = console() {
                        self.gate.watch_console(reader);
                    }
                }
                if !self.gate.wait_for_unpause(config.unpause_poll(), &self.stop) {
                    break;
                }
                self.set_paused(false);
                tracing::info!(iteration = iterations, "now updating worlds");
            }
            self.update(config.steps_per_iteration)?;
            iterations += 1;
            tracing::trace!(iteration = iterations, "loop iteration done");
        }
        self.stop();
        Ok(iterations)
    }

    /// Stop stepping and release every world.
    pub fn stop(&mut self) {
        if self.state == Lifecycle::Stopped {
            return;
        }
        self.stop.stop();
        self.state = Lifecycle::Stopped;
        let released = self.worlds.len() + usize::from(self.mirror.is_some());
        self.worlds.clear();
        self.mirror = None;
        tracing::info!(released, "world manager stopped");
    }

    /// Log a snapshot of every world and of the mirror.
    pub fn log_world_states(&self) {
        for world in self.worlds.iter().chain(self.mirror.iter()) {
            tracing::info!("\n{}", world.capture_snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiworld_kernel::SimWorld;
    use multiworld_scene::{SceneElement, empty_world};
    use multiworld_transport::ControlMessage;
    use std::io::{Cursor, Empty};
    use std::time::{Duration, Instant};

    fn world(name: &str, engine: &str) -> Box<dyn EngineInstance> {
        let scene = SceneElement::new("world")
            .with_attribute("name", name)
            .with_child(SceneElement::new("physics").with_attribute("type", engine))
            .with_child(
                SceneElement::new("model")
                    .with_attribute("name", "ball")
                    .with_child(SceneElement::new("pose").with_text("0 0 10 0 0 0")),
            );
        Box::new(SimWorld::from_scene(&scene).unwrap())
    }

    fn loaded(policy: TimePolicy) -> WorldManager {
        let mut m = WorldManager::new(policy);
        m.add_world(world("w0", "ode")).unwrap();
        m.add_world(world("w1", "bullet")).unwrap();
        m.set_mirror(Box::new(SimWorld::from_scene(&empty_world("mirror")).unwrap()))
            .unwrap();
        m
    }

    fn quick(max_iterations: Option<u64>) -> ServerConfig {
        ServerConfig {
            unpause_poll_ms: 2,
            max_iterations,
            ..ServerConfig::default()
        }
    }

    fn ball_z(world: &dyn EngineInstance) -> f32 {
        world.entity("ball").unwrap().pose.position.z
    }

    #[test]
    fn lifecycle_transitions() {
        let mut m = WorldManager::new(TimePolicy::UseTarget);
        assert_eq!(m.state(), Lifecycle::Unloaded);
        assert!(matches!(m.update(1), Err(ManagerError::NotLoaded)));
        m.add_world(world("w0", "ode")).unwrap();
        assert_eq!(m.state(), Lifecycle::Loaded);
        m.set_paused(true);
        assert_eq!(m.state(), Lifecycle::Loaded);
        assert!(m.world(0).unwrap().is_paused());
        m.set_paused(false);
        assert_eq!(m.state(), Lifecycle::Running);
        m.set_paused(true);
        assert_eq!(m.state(), Lifecycle::Paused);
        m.stop();
        assert_eq!(m.state(), Lifecycle::Stopped);
        assert_eq!(m.world_count(), 0);
        assert!(matches!(m.update(1), Err(ManagerError::Stopped)));
        assert!(matches!(m.add_world(world("w1", "ode")), Err(ManagerError::Stopped)));
    }

    #[test]
    fn update_steps_every_world_and_syncs_mirror() {
        let mut m = loaded(TimePolicy::UseTarget);
        m.update(20).unwrap();
        for w in m.worlds() {
            assert_eq!(w.capture_snapshot().time.iterations, 20);
        }
        let w0 = m.world(0).unwrap().capture_snapshot();
        let mirror = m.mirror().unwrap().capture_snapshot();
        assert_eq!(mirror.time, w0.time);
        assert_eq!(mirror.get("ball").unwrap().pose, w0.get("ball").unwrap().pose);
        // Different integrators drift apart.
        assert_ne!(ball_z(m.world(0).unwrap()), ball_z(m.world(1).unwrap()));
    }

    #[test]
    fn mirror_follows_selected_world() {
        let mut m = loaded(TimePolicy::UseTarget);
        m.set_mirrored_world(1).unwrap();
        m.update(15).unwrap();
        assert_eq!(ball_z(m.mirror().unwrap()), ball_z(m.world(1).unwrap()));
        assert!(matches!(
            m.set_mirrored_world(2),
            Err(ManagerError::NoSuchWorld { index: 2, count: 2 })
        ));
        assert_eq!(m.mirrored_world(), 1);
    }

    #[test]
    fn paused_worlds_do_not_advance() {
        let mut m = loaded(TimePolicy::UseCurrent);
        m.set_paused(true);
        m.update(5).unwrap();
        assert_eq!(m.world(0).unwrap().capture_snapshot().time.iterations, 0);
    }

    #[test]
    fn run_unpauses_from_console_and_stops_at_limit() {
        let mut m = loaded(TimePolicy::UseTarget);
        let done = m
            .run(&quick(Some(12)), || Some(Cursor::new(b"\n".to_vec())))
            .unwrap();
        assert_eq!(done, 12);
        assert_eq!(m.state(), Lifecycle::Running);
        assert_eq!(m.world(1).unwrap().capture_snapshot().time.iterations, 12);
    }

    #[test]
    fn run_unpauses_from_control_channel() {
        let mut m = loaded(TimePolicy::UseTarget);
        let channel = ControlChannel::new();
        m.attach_control(&channel);
        assert!(channel.publish(ControlMessage::Pause(false)));
        let done = m.run(&quick(Some(3)), || None::<Empty>).unwrap();
        assert_eq!(done, 3);
    }

    #[test]
    fn stop_handle_ends_paused_run_and_releases_worlds() {
        let mut m = loaded(TimePolicy::UseTarget);
        let stop = m.stop_handle();
        let start = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stop.stop();
        });
        let done = m.run(&quick(None), || None::<Empty>).unwrap();
        handle.join().unwrap();
        assert_eq!(done, 0);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(m.state(), Lifecycle::Stopped);
        assert!(m.mirror().is_none());
    }

    #[test]
    fn pause_request_while_running_waits_again() {
        let mut m = loaded(TimePolicy::UseTarget);
        let channel = ControlChannel::new();
        m.attach_control(&channel);
        m.gate().request_pause(false);
        let stop = m.stop_handle();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            channel.publish(ControlMessage::Pause(true));
            thread::sleep(Duration::from_millis(50));
            stop.stop();
        });
        let done = m.run(&quick(None), || None::<Empty>).unwrap();
        handle.join().unwrap();
        assert!(done > 0);
        assert_eq!(m.state(), Lifecycle::Stopped);
    }

    #[test]
    fn run_without_worlds_fails() {
        let mut m = WorldManager::new(TimePolicy::UseTarget);
        assert!(matches!(
            m.run(&quick(Some(1)), || None::<Empty>),
            Err(ManagerError::NotLoaded)
        ));
    }
}
