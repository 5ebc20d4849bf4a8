use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Registry {
    namespaces: Vec<String>,
    /// Bumped on every advertise/withdraw.
    generation: u64,
}

#[derive(Debug, Default)]
struct Shared {
    registry: Mutex<Registry>,
    changed: Condvar,
}

/// Shared discovery mechanism on which world namespaces become visible.
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryBus {
    shared: Arc<Shared>,
}

impl DiscoveryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a namespace visible. Re-advertising a visible namespace is a no-op.
    pub fn advertise(&self, namespace: &str) {
        let mut reg = self.registry();
        if reg.namespaces.iter().any(|n| n == namespace) {
            return;
        }
        reg.namespaces.push(namespace.to_string());
        reg.generation += 1;
        tracing::debug!(namespace, "namespace advertised");
        self.shared.changed.notify_all();
    }

    /// Remove a namespace. Returns whether it was visible.
    pub fn withdraw(&self, namespace: &str) -> bool {
        let mut reg = self.registry();
        let before = reg.namespaces.len();
        reg.namespaces.retain(|n| n != namespace);
        let removed = reg.namespaces.len() != before;
        if removed {
            reg.generation += 1;
            tracing::debug!(namespace, "namespace withdrawn");
            self.shared.changed.notify_all();
        }
        removed
    }

    /// Visible namespaces, in the order they were advertised.
    pub fn namespaces(&self) -> Vec<String> {
        self.registry().namespaces.clone()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.registry().namespaces.iter().any(|n| n == namespace)
    }

    /// Current generation; changes whenever the namespace list does.
    pub fn generation(&self) -> u64 {
        self.registry().generation
    }

    /// Block until the generation differs from `seen` or `timeout` elapses.
    /// Returns the generation observed on wake-up.
    pub fn wait_for_update(&self, seen: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut reg = self.registry();
        while reg.generation == seen {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            reg = self
                .shared
                .changed
                .wait_timeout(reg, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        reg.generation
    }
}
