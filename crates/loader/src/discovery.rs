use multiworld_transport::DiscoveryBus;
use std::time::{Duration, Instant};

/// Bounds on the wait for a new world's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Block until `namespace` is visible on `bus`, waking at most every
/// `poll_interval`. Returns false once `max_wait` has elapsed.
pub fn wait_for_discoverable(
    bus: &DiscoveryBus,
    namespace: &str,
    max_wait: Duration,
    poll_interval: Duration,
) -> bool {
    tracing::debug!(namespace, "waiting for namespace");
    let start = Instant::now();
    loop {
        let seen = bus.generation();
        if bus.contains(namespace) {
            tracing::info!(namespace, "namespace received");
            return true;
        }
        let elapsed = start.elapsed();
        if elapsed >= max_wait {
            tracing::warn!(namespace, ?max_wait, "unsuccessful wait for namespace");
            return false;
        }
        bus.wait_for_update(seen, poll_interval.min(max_wait - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn finds_already_visible() {
        let bus = DiscoveryBus::new();
        bus.advertise("w0");
        assert!(wait_for_discoverable(&bus, "w0", Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn times_out() {
        let bus = DiscoveryBus::new();
        bus.advertise("other");
        let start = Instant::now();
        assert!(!wait_for_discoverable(
            &bus,
            "w0",
            Duration::from_millis(50),
            Duration::from_millis(10)
        ));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wakes_on_late_advertise() {
        let bus = DiscoveryBus::new();
        let remote = bus.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.advertise("noise");
            thread::sleep(Duration::from_millis(30));
            remote.advertise("w0");
        });
        assert!(wait_for_discoverable(
            &bus,
            "w0",
            Duration::from_secs(5),
            Duration::from_secs(1)
        ));
        handle.join().unwrap();
    }
}
