use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// A recurring health-check registration: "check `cluster_id` with
/// `check_type` every `interval` seconds". Claimed by one engine at a time,
/// the same way [`crate::Service`] liveness works for the Dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub id: String,
    pub cluster_id: String,
    pub check_type: String,
    pub interval: i64,
    pub owner: Option<String>,
    pub updated_at: OffsetDateTime,
    pub disabled: bool,
}

impl HealthCheck {
    pub fn new(id: impl Into<String>, cluster_id: impl Into<String>, check_type: impl Into<String>, interval: i64) -> Self {
        HealthCheck {
            id: id.into(),
            cluster_id: cluster_id.into(),
            check_type: check_type.into(),
            interval,
            owner: None,
            updated_at: OffsetDateTime::now_utc(),
            disabled: false,
        }
    }

    /// Due for another tick: unclaimed, or claimed by an engine whose
    /// heartbeat lapsed (same liveness rule as [`crate::Service::is_dead`]).
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        !self.disabled && now - self.updated_at >= time::Duration::seconds(self.interval)
    }
}
