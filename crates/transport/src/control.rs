use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Commands accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// `true` requests pause, `false` requests unpause.
    Pause(bool),
}

type PauseCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    pause: Vec<PauseCallback>,
}

/// External command channel.
///
/// Published messages are delivered on a dedicated delivery thread, so
/// callbacks run concurrently with whoever published and whoever owns the
/// registered state. The delivery thread exits once every handle is dropped.
#[derive(Clone)]
pub struct ControlChannel {
    sender: Sender<ControlMessage>,
    callbacks: Arc<Mutex<Callbacks>>,
}

impl ControlChannel {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<ControlMessage>();
        let callbacks: Arc<Mutex<Callbacks>> = Arc::default();
        let delivery = Arc::clone(&callbacks);
        let spawned = thread::Builder::new()
            .name("control-delivery".into())
            .spawn(move || {
                for message in receiver {
                    tracing::debug!(?message, "control message");
                    let ControlMessage::Pause(pause) = message;
                    let targets = delivery
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pause
                        .clone();
                    for callback in targets {
                        callback(pause);
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::error!("failed to start control delivery thread: {e}");
        }
        Self { sender, callbacks }
    }

    /// Register a callback invoked with the requested pause state.
    pub fn register_pause_callback(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pause
            .push(Arc::new(callback));
    }

    /// Queue a message for delivery. Returns false if delivery has stopped.
    pub fn publish(&self, message: ControlMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn callback_runs_on_delivery_thread() {
        let channel = ControlChannel::new();
        let unpaused = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&unpaused);
        let caller = thread::current().id();
        let other_thread = Arc::new(AtomicBool::new(false));
        let seen_other = Arc::clone(&other_thread);
        channel.register_pause_callback(move |pause| {
            seen_other.store(thread::current().id() != caller, Ordering::SeqCst);
            flag.store(!pause, Ordering::SeqCst);
        });

        assert!(channel.publish(ControlMessage::Pause(false)));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !unpaused.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(unpaused.load(Ordering::SeqCst));
        assert!(other_thread.load(Ordering::SeqCst));
    }
}
