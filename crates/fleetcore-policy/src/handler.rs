//! Interface implemented by policy-type-specific decision modules.
use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_models::Action;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterPolicyBinding;
use fleetcore_models::DataMap;

/// Which side of an action a policy hook runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpPhase {
    Before,
    After,
}

/// Interface for policy-type-specific decision logic.
///
/// `pre_op`/`post_op` may record a decision into `action.data` (a batching
/// plan, victim list, placement zones, ...), or veto the action by writing
/// `action.data["status"] = "ERROR"` and a `"reason"`. They may also mutate
/// `binding.data`; the [`crate::PolicyChecker`] persists it on return.
#[async_trait::async_trait]
pub trait PolicyHandler: std::fmt::Debug + Send + Sync {
    /// Validates a policy's `spec` at creation time.
    fn validate(&self, spec: &DataMap) -> Result<()>;

    /// Called when a binding is first created; returning `false` rolls the
    /// binding back.
    async fn attach(&self, context: &Context, cluster: &Cluster, binding: &mut ClusterPolicyBinding) -> Result<bool>;

    /// Called when a binding is about to be removed.
    async fn detach(&self, context: &Context, cluster: &Cluster, binding: &mut ClusterPolicyBinding) -> Result<()>;

    /// Runs before the action body executes.
    async fn pre_op(&self, context: &Context, cluster_id: &str, binding: &mut ClusterPolicyBinding, action: &mut Action) -> Result<()>;

    /// Runs after the action body executes.
    async fn post_op(&self, context: &Context, cluster_id: &str, binding: &mut ClusterPolicyBinding, action: &mut Action) -> Result<()>;
}
