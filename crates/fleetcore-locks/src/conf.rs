use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Retry schedule for contended lock acquisition.
///
/// Unlike [the task executor's exponential backoff](fleetcore_store), lock
/// contention is retried at a constant interval: the contract only promises
/// "up to `retry_times`, spaced `retry_interval` apart", not a growing delay.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocksConf {
    #[serde(default = "LocksConf::default_retry_times")]
    pub retry_times: u16,

    #[serde(default = "LocksConf::default_retry_interval", with = "humantime_seconds")]
    pub retry_interval: Duration,
}

impl LocksConf {
    fn default_retry_times() -> u16 {
        3
    }

    fn default_retry_interval() -> Duration {
        Duration::from_secs(1)
    }
}

impl Default for LocksConf {
    fn default() -> Self {
        LocksConf {
            retry_times: Self::default_retry_times(),
            retry_interval: Self::default_retry_interval(),
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
