use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// Engine-worker liveness record.
///
/// Renewed every `periodic_interval` seconds by the owning engine; a service
/// is considered dead once `now - updated_at > 2 * periodic_interval`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub host: String,
    pub binary: String,
    pub topic: String,
    pub updated_at: OffsetDateTime,
    pub disabled: bool,
    pub disabled_reason: String,
}

impl Service {
    pub fn new(id: impl Into<String>, host: impl Into<String>, binary: impl Into<String>, topic: impl Into<String>) -> Self {
        Service {
            id: id.into(),
            host: host.into(),
            binary: binary.into(),
            topic: topic.into(),
            updated_at: OffsetDateTime::now_utc(),
            disabled: false,
            disabled_reason: String::new(),
        }
    }

    /// Dead once two consecutive heartbeats (`2 * periodic_interval`) are missed.
    pub fn is_dead(&self, now: OffsetDateTime, periodic_interval: time::Duration) -> bool {
        now - self.updated_at > periodic_interval * 2
    }
}
