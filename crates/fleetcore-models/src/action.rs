use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// `-1` marks a one-shot action; any other value is a recurrence interval in
/// seconds.
pub const ONE_SHOT: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    ClusterCreate,
    ClusterDelete,
    ClusterUpdate,
    ClusterAddNodes,
    ClusterDelNodes,
    ClusterResize,
    ClusterScaleIn,
    ClusterScaleOut,
    ClusterReplaceNodes,
    ClusterCheck,
    ClusterRecover,
    ClusterAttachPolicy,
    ClusterDetachPolicy,
    ClusterUpdatePolicy,
    ClusterOperation,
    NodeCreate,
    NodeDelete,
    NodeUpdate,
    NodeCheck,
    NodeRecover,
    NodeOperation,
}

impl ActionKind {
    /// True for `CLUSTER_*` kinds, whose target is a cluster id.
    pub fn targets_cluster(self) -> bool {
        !matches!(
            self,
            ActionKind::NodeCreate
                | ActionKind::NodeDelete
                | ActionKind::NodeUpdate
                | ActionKind::NodeCheck
                | ActionKind::NodeRecover
                | ActionKind::NodeOperation
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Init,
    Waiting,
    Ready,
    Running,
    Suspended,
    Succeeded,
    Failed,
    Cancelled,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Succeeded | ActionStatus::Failed | ActionStatus::Cancelled
        )
    }
}

/// A control signal written by a caller and observed by the engine at the
/// next checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionControl {
    None,
    Cancel,
    Suspend,
    Resume,
}

impl Default for ActionControl {
    fn default() -> Self {
        ActionControl::None
    }
}

/// A unit of scheduled work with a state machine and a dependency DAG.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    /// Id of the cluster/node/policy this action operates on.
    pub target: String,
    pub action: ActionKind,
    /// Free-form description of what originated this action.
    pub cause: String,
    /// Worker id holding this action while `RUNNING`.
    pub owner: Option<String>,
    /// Recurrence interval in seconds; [`ONE_SHOT`] for one-shot actions.
    pub interval: i64,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub timeout: u64,
    pub status: ActionStatus,
    pub status_reason: String,
    pub control: ActionControl,
    pub inputs: DataMap,
    pub outputs: DataMap,
    pub depends_on: BTreeSet<String>,
    pub depended_by: BTreeSet<String>,
    /// Scratch shared with policy hooks (batching plans, victim lists, ...).
    pub data: DataMap,
    pub project: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Action {
    pub fn new(id: impl Into<String>, target: impl Into<String>, action: ActionKind, project: impl Into<String>, default_timeout: u64) -> Self {
        let now = OffsetDateTime::now_utc();
        Action {
            id: id.into(),
            name: String::new(),
            target: target.into(),
            action,
            cause: String::new(),
            owner: None,
            interval: ONE_SHOT,
            start_time: None,
            end_time: None,
            timeout: default_timeout,
            status: ActionStatus::Init,
            status_reason: String::new(),
            control: ActionControl::None,
            inputs: DataMap::new(),
            outputs: DataMap::new(),
            depends_on: BTreeSet::new(),
            depended_by: BTreeSet::new(),
            data: DataMap::new(),
            project: project.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `status == READY`, every dependency has resolved, and
    /// `start_time` (the wave-pacing hint `spawn_waves` sets on wave 2+) has
    /// either not been set or has already passed `now`.
    pub fn is_ready(&self, now: OffsetDateTime) -> bool {
        self.status == ActionStatus::Ready && self.depends_on.is_empty() && self.start_time.map(|start| now >= start).unwrap_or(true)
    }

    pub fn mark_cancel_requested(&mut self) {
        self.control = ActionControl::Cancel;
    }

    pub fn cancel_requested(&self) -> bool {
        self.control == ActionControl::Cancel
    }
}
