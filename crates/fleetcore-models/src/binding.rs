use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// Attaches a [`crate::Policy`] to a [`crate::Cluster`].
///
/// Unique per `(cluster_id, policy_id)`. `priority` orders enforcement among
/// policies bound to the same cluster (lower runs first); ties are unordered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterPolicyBinding {
    pub cluster_id: String,
    pub policy_id: String,
    pub priority: i32,
    pub enabled: bool,
    pub data: DataMap,
    pub last_op: Option<OffsetDateTime>,
}

impl ClusterPolicyBinding {
    pub fn new(cluster_id: impl Into<String>, policy_id: impl Into<String>, priority: i32) -> Self {
        ClusterPolicyBinding {
            cluster_id: cluster_id.into(),
            policy_id: policy_id.into(),
            priority,
            enabled: true,
            data: DataMap::new(),
            last_op: None,
        }
    }
}
