//! Worker pool sizing and heartbeat configuration.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Incremental-delay retry configuration, shared shape with [`fleetcore_locks::LocksConf`]'s
/// retry loop but applied to Store polling errors rather than lock contention.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DispatcherBackoff {
    #[serde(default = "DispatcherBackoff::default_start_delay")]
    pub start_delay_ms: u64,
    #[serde(default = "DispatcherBackoff::default_max_delay")]
    pub max_delay_secs: u64,
    #[serde(default = "DispatcherBackoff::default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "DispatcherBackoff::default_max_retries")]
    pub max_retries: u16,
}

impl Default for DispatcherBackoff {
    fn default() -> Self {
        DispatcherBackoff {
            start_delay_ms: Self::default_start_delay(),
            max_delay_secs: Self::default_max_delay(),
            multiplier: Self::default_multiplier(),
            max_retries: Self::default_max_retries(),
        }
    }
}

impl DispatcherBackoff {
    fn default_start_delay() -> u64 {
        200
    }

    fn default_max_delay() -> u64 {
        30
    }

    fn default_multiplier() -> u32 {
        2
    }

    fn default_max_retries() -> u16 {
        10
    }
}

/// Configuration for the [`crate::Dispatcher`] loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatcherConf {
    /// Maximum number of actions executed concurrently by this engine.
    #[serde(default = "DispatcherConf::default_concurrent_actions")]
    pub concurrent_actions: usize,

    /// How often to poll the Store for newly READY actions when no
    /// notification woke the loop up sooner.
    #[serde(default = "DispatcherConf::default_poll_interval", with = "duration_secs")]
    pub poll_interval: Duration,

    /// Heartbeat period for the owning [`fleetcore_models::Service`] row.
    /// Missing two consecutive heartbeats (`2 * periodic_interval`) marks
    /// the engine dead for the purposes of [`fleetcore_locks::LockManager::sweep_dead_engine`].
    #[serde(default = "DispatcherConf::default_periodic_interval", with = "duration_secs")]
    pub periodic_interval: Duration,

    #[serde(default)]
    pub backoff: DispatcherBackoff,
}

impl Default for DispatcherConf {
    fn default() -> Self {
        DispatcherConf {
            concurrent_actions: Self::default_concurrent_actions(),
            poll_interval: Self::default_poll_interval(),
            periodic_interval: Self::default_periodic_interval(),
            backoff: Default::default(),
        }
    }
}

impl DispatcherConf {
    fn default_concurrent_actions() -> usize {
        let parallel = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(8);
        parallel * 2
    }

    fn default_poll_interval() -> Duration {
        Duration::from_secs(1)
    }

    fn default_periodic_interval() -> Duration {
        Duration::from_secs(30)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
