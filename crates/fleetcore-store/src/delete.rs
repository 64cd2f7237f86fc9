use self::seal::SealDeleteOp;

/// Something that can be deleted through [`crate::Store::delete`].
pub trait DeleteOp: Into<DeleteOps> + SealDeleteOp {
    type Response: From<DeleteResponses>;
}

#[derive(Clone, Debug)]
pub enum DeleteOps {
    Profile(DeleteProfile),
    Cluster(DeleteCluster),
    Node(DeleteNode),
    Policy(DeletePolicy),
    ClusterPolicyBinding(DeleteClusterPolicyBinding),
    Credential(DeleteCredential),
    Service(DeleteService),
    HealthCheck(DeleteHealthCheck),
}

pub enum DeleteResponses {
    Success,
}

mod seal {
    pub trait SealDeleteOp {}
}

macro_rules! delete_op {
    ($name:ident, $variant:ident) => {
        impl DeleteOp for $name {
            type Response = ();
        }
        impl SealDeleteOp for $name {}
        impl From<$name> for DeleteOps {
            fn from(op: $name) -> DeleteOps {
                DeleteOps::$variant(op)
            }
        }
    };
}

/// Hard delete; profiles are removed only after the caller has verified no
/// live cluster/node references them (`ResourceBusy` otherwise).
#[derive(Clone, Debug)]
pub struct DeleteProfile {
    pub id: String,
}

impl From<&str> for DeleteProfile {
    fn from(id: &str) -> Self {
        DeleteProfile { id: id.to_string() }
    }
}

/// Soft delete: sets `deleted_at`/`end_time`, future reads filter it by default.
#[derive(Clone, Debug)]
pub struct DeleteCluster {
    pub id: String,
}

impl From<&str> for DeleteCluster {
    fn from(id: &str) -> Self {
        DeleteCluster { id: id.to_string() }
    }
}

/// Soft delete, mirrors [`DeleteCluster`].
#[derive(Clone, Debug)]
pub struct DeleteNode {
    pub id: String,
}

impl From<&str> for DeleteNode {
    fn from(id: &str) -> Self {
        DeleteNode { id: id.to_string() }
    }
}

/// Hard delete, subject to the same `ResourceBusy` check as profiles.
#[derive(Clone, Debug)]
pub struct DeletePolicy {
    pub id: String,
}

impl From<&str> for DeletePolicy {
    fn from(id: &str) -> Self {
        DeletePolicy { id: id.to_string() }
    }
}

#[derive(Clone, Debug)]
pub struct DeleteClusterPolicyBinding {
    pub cluster_id: String,
    pub policy_id: String,
}

#[derive(Clone, Debug)]
pub struct DeleteCredential {
    pub user: String,
    pub project: String,
}

#[derive(Clone, Debug)]
pub struct DeleteService {
    pub id: String,
}

impl From<&str> for DeleteService {
    fn from(id: &str) -> Self {
        DeleteService { id: id.to_string() }
    }
}

/// Hard delete of a [`fleetcore_models::HealthCheck`] registration.
#[derive(Clone, Debug)]
pub struct DeleteHealthCheck {
    pub id: String,
}

impl From<&str> for DeleteHealthCheck {
    fn from(id: &str) -> Self {
        DeleteHealthCheck { id: id.to_string() }
    }
}

delete_op!(DeleteProfile, Profile);
delete_op!(DeleteCluster, Cluster);
delete_op!(DeleteNode, Node);
delete_op!(DeletePolicy, Policy);
delete_op!(DeleteClusterPolicyBinding, ClusterPolicyBinding);
delete_op!(DeleteCredential, Credential);
delete_op!(DeleteService, Service);
delete_op!(DeleteHealthCheck, HealthCheck);

impl From<DeleteResponses> for () {
    fn from(_: DeleteResponses) -> Self {}
}
