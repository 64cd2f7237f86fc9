use serde::Deserialize;
use serde::Serialize;

/// Retention knobs for `StoredEvent` rows, consumed by whatever periodic
/// sweep a deployment wires up around the Store's `event_prune`/`event_purge`
/// operations.
///
/// No sweep ships in this crate: the legacy source carried a commented-out
/// bulk purge routine and no fully specified retention policy, so the
/// default here is "never purge" (see DESIGN.md).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConf {
    /// Per-cluster cap on stored events; `0` disables pruning entirely.
    #[serde(default)]
    pub max_events_per_cluster: u32,

    /// Batch size used by bulk purge sweeps.
    #[serde(default = "EventsConf::default_purge_batch_size")]
    pub event_purge_batch_size: u32,
}

impl EventsConf {
    fn default_purge_batch_size() -> u32 {
        100
    }
}

impl Default for EventsConf {
    fn default() -> Self {
        EventsConf {
            max_events_per_cluster: 0,
            event_purge_batch_size: Self::default_purge_batch_size(),
        }
    }
}
