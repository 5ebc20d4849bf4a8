use multiworld_transport::ControlChannel;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct Flags {
    /// Written by the control channel callback.
    unpaused: AtomicBool,
    /// Written by the console watcher.
    key_pressed: AtomicBool,
    /// A console watcher is blocked on input.
    console_waiting: AtomicBool,
}

/// Request to leave the run loop, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Interactive gate between the paused and running states.
///
/// Two independent producers can open it: the control channel's pause
/// callback and a console watcher that fires on one line of input. Only the
/// control thread consumes the flags.
#[derive(Debug, Clone, Default)]
pub struct PauseGate {
    flags: Arc<Flags>,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the channel's pause requests into this gate.
    pub fn attach(&self, channel: &ControlChannel) {
        let gate = self.clone();
        channel.register_pause_callback(move |pause| gate.request_pause(pause));
    }

    pub fn request_pause(&self, pause: bool) {
        self.flags.unpaused.store(!pause, Ordering::SeqCst);
    }

    pub fn is_unpaused(&self) -> bool {
        self.flags.unpaused.load(Ordering::SeqCst)
    }

    /// Start a wait cycle on the console: clear any earlier key press and
    /// wait for one line on `reader` in the background. A watcher still
    /// blocked from an earlier cycle is reused instead of starting another.
    pub fn watch_console<R>(&self, mut reader: R)
    where
        R: BufRead + Send + 'static,
    {
        self.flags.key_pressed.store(false, Ordering::SeqCst);
        if self.flags.console_waiting.swap(true, Ordering::SeqCst) {
            return;
        }
        let flags = Arc::clone(&self.flags);
        let spawned = thread::Builder::new()
            .name("console-watch".into())
            .spawn(move || {
                let mut line = String::new();
                if let Err(e) = reader.read_line(&mut line) {
                    tracing::debug!("console read failed: {e}");
                }
                flags.key_pressed.store(true, Ordering::SeqCst);
                flags.console_waiting.store(false, Ordering::SeqCst);
            });
        if let Err(e) = spawned {
            tracing::error!("failed to start console watcher: {e}");
            self.flags.console_waiting.store(false, Ordering::SeqCst);
        }
    }

    /// Block until either producer opens the gate, polling every `poll`.
    /// Returns false if `stop` was triggered first.
    ///
    /// On return the gate is left open, so only a later pause request
    /// closes it again.
    pub fn wait_for_unpause(&self, poll: Duration, stop: &StopHandle) -> bool {
        loop {
            if stop.is_stopped() {
                return false;
            }
            if self.is_unpaused() || self.flags.key_pressed.swap(false, Ordering::SeqCst) {
                self.flags.unpaused.store(true, Ordering::SeqCst);
                return true;
            }
            thread::sleep(poll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiworld_transport::ControlMessage;
    use std::io::Cursor;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn console_line_opens_gate() {
        let gate = PauseGate::new();
        gate.watch_console(Cursor::new(b"\n".to_vec()));
        assert!(gate.wait_for_unpause(POLL, &StopHandle::default()));
        assert!(gate.is_unpaused());
    }

    #[test]
    fn control_channel_opens_gate() {
        let gate = PauseGate::new();
        let channel = ControlChannel::new();
        gate.attach(&channel);
        let remote = channel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.publish(ControlMessage::Pause(false));
        });
        assert!(gate.wait_for_unpause(POLL, &StopHandle::default()));
        handle.join().unwrap();
    }

    #[test]
    fn pause_request_closes_gate() {
        let gate = PauseGate::new();
        gate.request_pause(false);
        assert!(gate.is_unpaused());
        gate.request_pause(true);
        gate.request_pause(true);
        assert!(!gate.is_unpaused());
    }

    #[test]
    fn stop_abandons_wait() {
        let gate = PauseGate::new();
        let stop = StopHandle::default();
        let remote = stop.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.stop();
        });
        assert!(!gate.wait_for_unpause(POLL, &stop));
        assert!(start.elapsed() >= Duration::from_millis(20));
        handle.join().unwrap();
    }

    #[test]
    fn single_console_watcher_at_a_time() {
        let gate = PauseGate::new();
        gate.flags.console_waiting.store(true, Ordering::SeqCst);
        gate.watch_console(Cursor::new(b"\n".to_vec()));
        thread::sleep(Duration::from_millis(20));
        assert!(!gate.flags.key_pressed.load(Ordering::SeqCst));
    }
}
