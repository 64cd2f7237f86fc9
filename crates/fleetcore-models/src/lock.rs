use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// Scope requested/held on a cluster lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockScope {
    /// `-1` in the source model; only one holder, excludes all others.
    Exclusive,
    /// `1` in the source model; any number of holders may coexist.
    Shared,
}

impl LockScope {
    pub fn as_i32(self) -> i32 {
        match self {
            LockScope::Exclusive => -1,
            LockScope::Shared => 1,
        }
    }
}

/// Exclusive or shared lock on a cluster.
///
/// Invariant: when `scope` is [`LockScope::Exclusive`], `action_ids` has at
/// most one entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterLock {
    pub cluster_id: String,
    pub action_ids: BTreeSet<String>,
    pub scope: LockScope,
}

impl ClusterLock {
    pub fn holders(&self) -> &BTreeSet<String> {
        &self.action_ids
    }
}

/// Exclusive lock on a single node; always exclusive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeLock {
    pub node_id: String,
    pub action_id: String,
}
