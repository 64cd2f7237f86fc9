use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Configuration for the [`crate::HealthRegistry`] tick loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthRegistryConf {
    /// How often the loop scans for due [`fleetcore_models::HealthCheck`] rows.
    /// Independent of each row's own `interval`: this is the poll granularity,
    /// not the check cadence.
    #[serde(default = "HealthRegistryConf::default_scan_interval", with = "humantime_seconds")]
    pub scan_interval: Duration,

    /// `timeout` carried by originated `CLUSTER_CHECK` actions when the
    /// target cluster does not specify one of its own.
    #[serde(default = "HealthRegistryConf::default_action_timeout")]
    pub default_action_timeout: u64,
}

impl HealthRegistryConf {
    fn default_scan_interval() -> Duration {
        Duration::from_secs(10)
    }

    fn default_action_timeout() -> u64 {
        300
    }
}

impl Default for HealthRegistryConf {
    fn default() -> Self {
        HealthRegistryConf {
            scan_interval: Self::default_scan_interval(),
            default_action_timeout: Self::default_action_timeout(),
        }
    }
}

/// (De)serialises a [`Duration`] as a whole number of seconds.
mod humantime_seconds {
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
