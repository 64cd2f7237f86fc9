use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use fleetcore_errors::EngineError;
use fleetcore_errors::InvalidParameter;

use crate::DataMap;

/// `-1` means the cluster has no upper bound on its size.
pub const UNBOUNDED_MAX_SIZE: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStatus {
    Init,
    Creating,
    Active,
    Updating,
    Resizing,
    Critical,
    Warning,
    Error,
    Deleting,
}

/// A set of nodes sharing a profile, driven through lifecycle operations as
/// one unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub profile_id: String,
    pub user: String,
    pub project: String,
    pub min_size: i64,
    /// `-1` for unbounded.
    pub max_size: i64,
    pub desired_capacity: i64,
    /// Monotonic node index counter; always strictly greater than every live
    /// node's index in this cluster.
    pub next_index: i64,
    pub timeout: u64,
    pub status: ClusterStatus,
    pub status_reason: String,
    pub metadata: DataMap,
    pub data: DataMap,
    pub dependents: DataMap,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    /// Set once the cluster has been soft-deleted.
    pub deleted_at: Option<OffsetDateTime>,
}

impl Cluster {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        profile_id: impl Into<String>,
        user: impl Into<String>,
        project: impl Into<String>,
        min_size: i64,
        max_size: i64,
        desired_capacity: i64,
    ) -> Result<Self, EngineError> {
        let cluster = Cluster {
            id: id.into(),
            name: name.into(),
            profile_id: profile_id.into(),
            user: user.into(),
            project: project.into(),
            min_size,
            max_size,
            desired_capacity,
            next_index: 1,
            timeout: 3600,
            status: ClusterStatus::Init,
            status_reason: String::new(),
            metadata: DataMap::new(),
            data: DataMap::new(),
            dependents: DataMap::new(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            deleted_at: None,
        };
        cluster.check_invariants()?;
        Ok(cluster)
    }

    /// Effective upper bound, resolving `-1` to `i64::MAX` for arithmetic.
    pub fn effective_max(&self) -> i64 {
        if self.max_size == UNBOUNDED_MAX_SIZE {
            i64::MAX
        } else {
            self.max_size
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn check_invariants(&self) -> Result<(), EngineError> {
        if self.min_size > self.desired_capacity {
            return Err(InvalidParameter::new(
                "desired_capacity",
                format!(
                    "desired capacity {} is below min_size {}",
                    self.desired_capacity, self.min_size
                ),
            )
            .into());
        }
        if self.max_size != UNBOUNDED_MAX_SIZE && self.desired_capacity > self.max_size {
            return Err(InvalidParameter::new(
                "desired_capacity",
                format!(
                    "desired capacity {} exceeds max_size {}",
                    self.desired_capacity, self.max_size
                ),
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_desired_below_min() {
        let err = Cluster::new("c1", "n", "p1", "u", "proj", 3, 10, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }

    #[test]
    fn unbounded_max_allows_any_desired() {
        let cluster = Cluster::new("c1", "n", "p1", "u", "proj", 0, UNBOUNDED_MAX_SIZE, 1000).unwrap();
        assert_eq!(cluster.effective_max(), i64::MAX);
    }
}
