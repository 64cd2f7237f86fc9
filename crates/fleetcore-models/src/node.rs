use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// Nodes with no cluster use this sentinel index.
pub const ORPHAN_INDEX: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Init,
    Creating,
    Active,
    Updating,
    Error,
    Deleting,
    Recovering,
    Warning,
}

/// One managed resource instance produced from a [`crate::Profile`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Resource id assigned by the driver; empty until the node is created.
    pub physical_id: String,
    /// Empty string means the node is an orphan (not part of any cluster).
    pub cluster_id: String,
    /// Project of the owning cluster; empty for orphans. Kept in sync by
    /// `node_migrate` when a node joins or leaves a cluster.
    pub project: String,
    pub profile_id: String,
    /// `1..` within a cluster, or [`ORPHAN_INDEX`] for orphans.
    pub index: i64,
    pub role: String,
    pub status: NodeStatus,
    pub status_reason: String,
    pub metadata: DataMap,
    pub data: DataMap,
    pub dependents: DataMap,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
}

impl Node {
    pub fn orphan(id: impl Into<String>, name: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            name: name.into(),
            physical_id: String::new(),
            cluster_id: String::new(),
            project: String::new(),
            profile_id: profile_id.into(),
            index: ORPHAN_INDEX,
            role: String::new(),
            status: NodeStatus::Init,
            status_reason: String::new(),
            metadata: DataMap::new(),
            data: DataMap::new(),
            dependents: DataMap::new(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            deleted_at: None,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.cluster_id.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
