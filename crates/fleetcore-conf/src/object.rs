use serde::Deserialize;
use serde::Serialize;

use fleetcore_credentials::CredentialsConf;
use fleetcore_dispatcher::DispatcherConf;
use fleetcore_health::HealthRegistryConf;
use fleetcore_locks::LocksConf;

use crate::events::EventsConf;
use crate::logging::LoggingConf;
use crate::runtime::RuntimeConf;

/// Global configuration for a `fleetcore` engine process.
///
/// Engine identity (`host`/`binary`/`topic` on the [`fleetcore_models::Service`]
/// row) is derived at startup, not configured: two engines reading the same
/// file must not collide on id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conf {
    /// Worker pool sizing and heartbeat cadence for the [`fleetcore_dispatcher::Dispatcher`].
    #[serde(default)]
    pub dispatcher: DispatcherConf,

    /// Retry schedule for contended cluster/node lock acquisition.
    #[serde(default)]
    pub locks: LocksConf,

    /// Scan cadence for the [`fleetcore_health::HealthRegistry`] tick loop.
    #[serde(default)]
    pub health: HealthRegistryConf,

    /// Credential encryption key material.
    #[serde(default)]
    pub credentials: CredentialsConf,

    /// `StoredEvent` retention.
    #[serde(default)]
    pub events: EventsConf,

    /// Process logging.
    #[serde(default)]
    pub logging: LoggingConf,

    /// Async runtime sizing and shutdown grace period.
    #[serde(default)]
    pub runtime: RuntimeConf,
}

impl Default for Conf {
    fn default() -> Self {
        Conf {
            dispatcher: Default::default(),
            locks: Default::default(),
            health: Default::default(),
            credentials: Default::default(),
            events: Default::default(),
            logging: Default::default(),
            runtime: Default::default(),
        }
    }
}
