use multiworld_loader::DiscoveryConfig;
use multiworld_mirror::TimePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Server tunables. Every field may be omitted from the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Simulation steps per loop iteration.
    #[serde(default = "default_steps_per_iteration")]
    pub steps_per_iteration: u32,
    /// How often the unpause wait re-checks its flags.
    #[serde(default = "default_unpause_poll_ms")]
    pub unpause_poll_ms: u64,
    #[serde(default = "default_discovery_max_wait_ms")]
    pub discovery_max_wait_ms: u64,
    #[serde(default = "default_discovery_poll_ms")]
    pub discovery_poll_ms: u64,
    #[serde(default)]
    pub time_policy: TimePolicy,
    /// Name of the mirror world; empty disables the mirror.
    #[serde(default = "default_mirror_name")]
    pub mirror_name: String,
    /// Index of the world the mirror follows.
    #[serde(default)]
    pub mirrored_world: usize,
    /// Stop after this many iterations; run until stopped when absent.
    #[serde(default)]
    pub max_iterations: Option<u64>,
}

fn default_steps_per_iteration() -> u32 {
    1
}

fn default_unpause_poll_ms() -> u64 {
    100
}

fn default_discovery_max_wait_ms() -> u64 {
    10_000
}

fn default_discovery_poll_ms() -> u64 {
    1_000
}

fn default_mirror_name() -> String {
    "mirror".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            steps_per_iteration: default_steps_per_iteration(),
            unpause_poll_ms: default_unpause_poll_ms(),
            discovery_max_wait_ms: default_discovery_max_wait_ms(),
            discovery_poll_ms: default_discovery_poll_ms(),
            time_policy: TimePolicy::default(),
            mirror_name: default_mirror_name(),
            mirrored_world: 0,
            max_iterations: None,
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_wait: Duration::from_millis(self.discovery_max_wait_ms),
            poll_interval: Duration::from_millis(self.discovery_poll_ms),
        }
    }

    pub fn unpause_poll(&self) -> Duration {
        Duration::from_millis(self.unpause_poll_ms)
    }

    pub fn mirror_enabled(&self) -> bool {
        !self.mirror_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ServerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.discovery(), DiscoveryConfig::default());
        assert!(config.mirror_enabled());
    }

    #[test]
    fn partial_document_overrides() {
        let config = ServerConfig::from_yaml_str(
            "steps_per_iteration: 5\ntime_policy: current\nmirror_name: \"\"\nmax_iterations: 20\n",
        )
        .unwrap();
        assert_eq!(config.steps_per_iteration, 5);
        assert_eq!(config.time_policy, TimePolicy::UseCurrent);
        assert!(!config.mirror_enabled());
        assert_eq!(config.max_iterations, Some(20));
        assert_eq!(config.unpause_poll_ms, 100);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(matches!(
            ServerConfig::from_yaml_str("time_policy: sometimes"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.yaml");
        std::fs::write(&path, "mirrored_world: 2\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().mirrored_world, 2);
        assert!(matches!(
            ServerConfig::load(dir.path().join("absent.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
