use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_errors::NotFound;
use fleetcore_store::GetPolicy;
use fleetcore_store::ListClusterPolicyBindings;
use fleetcore_store::Store;
use time::OffsetDateTime;

use fleetcore_models::Action;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterPolicyBinding;

use crate::handler::OpPhase;
use crate::registry::PolicyRegistry;

/// Runs the enabled [`fleetcore_models::ClusterPolicyBinding`]s for a cluster
/// against an action, in ascending `priority` order.
///
/// A hook may veto the action by writing `action.data["status"] = "ERROR"`
/// and `action.data["reason"]`; the checker stops running further bindings
/// once that happens. Binding `data` and `last_op` are persisted after every
/// hook call, whether or not the hook vetoed.
#[derive(Clone)]
pub struct PolicyChecker {
    store: Store,
    registry: PolicyRegistry,
}

impl PolicyChecker {
    pub fn new(store: Store, registry: PolicyRegistry) -> Self {
        PolicyChecker { store, registry }
    }

    pub async fn pre_op(&self, context: &Context, cluster_id: &str, action: &mut Action) -> Result<()> {
        self.run(context, cluster_id, action, OpPhase::Before).await
    }

    pub async fn post_op(&self, context: &Context, cluster_id: &str, action: &mut Action) -> Result<()> {
        self.run(context, cluster_id, action, OpPhase::After).await
    }

    /// Resolves `(policy_kind, policy_version)`'s handler and calls its
    /// `attach()`.
    pub async fn attach(
        &self,
        context: &Context,
        policy_kind: &str,
        policy_version: &str,
        cluster: &Cluster,
        binding: &mut ClusterPolicyBinding,
    ) -> Result<bool> {
        let metadata = self.registry.lookup(policy_kind, policy_version)?;
        metadata.handler.attach(context, cluster, binding).await
    }

    /// Resolves `(policy_kind, policy_version)`'s handler and calls its
    /// `detach()`.
    pub async fn detach(
        &self,
        context: &Context,
        policy_kind: &str,
        policy_version: &str,
        cluster: &Cluster,
        binding: &mut ClusterPolicyBinding,
    ) -> Result<()> {
        let metadata = self.registry.lookup(policy_kind, policy_version)?;
        metadata.handler.detach(context, cluster, binding).await
    }

    async fn run(&self, context: &Context, cluster_id: &str, action: &mut Action, phase: OpPhase) -> Result<()> {
        let bindings = self
            .store
            .query(context, ListClusterPolicyBindings { cluster_id: cluster_id.to_string() })
            .await?;

        for mut binding in bindings {
            if !binding.enabled {
                continue;
            }
            let policy = self
                .store
                .query(context, GetPolicy::from(binding.policy_id.as_str()))
                .await?
                .ok_or_else(|| NotFound::new("Policy", binding.policy_id.clone()))?;
            let metadata = self.registry.lookup(&policy.kind, &policy.version)?;
            if !metadata.targets.iter().any(|(p, kind)| *p == phase && *kind == action.action) {
                continue;
            }

            match phase {
                OpPhase::Before => metadata.handler.pre_op(context, cluster_id, &mut binding, action).await?,
                OpPhase::After => metadata.handler.post_op(context, cluster_id, &mut binding, action).await?,
            }

            binding.last_op = Some(OffsetDateTime::now_utc());
            self.store.persist(context, binding).await?;

            if action.data.get("status").and_then(|v| v.as_str()) == Some("ERROR") {
                break;
            }
        }
        Ok(())
    }
}
