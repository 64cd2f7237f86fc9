use fleetcore_clusterops::pause_between_waves;
use fleetcore_context::Context;
use fleetcore_depgraph::DependencyGraph;
use fleetcore_driver::DriverRegistry;
use fleetcore_errors::EngineError;
use fleetcore_errors::NotFound;
use fleetcore_events::Event;
use fleetcore_events::Events;
use fleetcore_locks::LockManager;
use fleetcore_models::Action;
use fleetcore_models::ActionStatus;
use fleetcore_policy::PolicyChecker;
use fleetcore_store::GetAction;
use fleetcore_store::GetCluster;
use fleetcore_store::GetNode;
use fleetcore_store::ListNodes;
use fleetcore_store::ListQuery;
use fleetcore_store::Store;
use time::OffsetDateTime;

use crate::outcome::Outcome;

/// Runs an action's body against real backends: drivers, policies, locks and
/// the dependency graph. One per engine process; shared across every action
/// it claims.
#[derive(Clone)]
pub struct ActionEngine {
    pub(crate) store: Store,
    pub(crate) depgraph: DependencyGraph,
    pub(crate) locks: LockManager,
    pub(crate) drivers: DriverRegistry,
    pub(crate) policy: PolicyChecker,
    pub(crate) events: Events,
}

impl ActionEngine {
    pub fn new(store: Store, locks: LockManager, drivers: DriverRegistry, policy: PolicyChecker, events: Events) -> Self {
        ActionEngine {
            depgraph: DependencyGraph::new(store.clone()),
            store,
            locks,
            drivers,
            policy,
            events,
        }
    }

    /// Runs one tick of `action_id` under `engine_id`'s ownership. The
    /// caller (the dispatcher) is responsible for having already claimed the
    /// action (set `status = RUNNING`, `owner = engine_id`) via a CAS
    /// persist; this only runs the body and propagates the result.
    pub async fn execute(&self, context: &Context, action_id: &str, engine_id: &str) -> anyhow::Result<()> {
        let mut action = self.fetch_action(context, action_id).await?;
        let cluster_id = self.owning_cluster(context, &action).await?;
        let resuming = action.data.contains_key("spawned");

        if !resuming {
            self.policy.pre_op(context, &cluster_id, &mut action).await?;
            if let Some(reason) = veto_reason(&action) {
                self.terminate(context, &mut action, ActionStatus::Failed, &reason).await?;
                return Ok(());
            }
            self.store.persist(context, action.clone()).await?;
        }

        let guards = self.acquire_locks(context, &action, engine_id, &cluster_id).await?;

        let outcome = self.run_body(context, &mut action).await;
        match outcome {
            Err(error) => {
                let reason = error.to_string();
                guards.release(context).await;
                self.terminate(context, &mut action, ActionStatus::Failed, &reason).await?;
            }
            Ok(Outcome::Pending) => {
                guards.forget();
            }
            Ok(Outcome::Done) => {
                self.policy.post_op(context, &cluster_id, &mut action).await?;
                if let Some(reason) = veto_reason(&action) {
                    guards.release(context).await;
                    self.terminate(context, &mut action, ActionStatus::Failed, &reason).await?;
                    return Ok(());
                }
                guards.release(context).await;
                self.depgraph.mark_succeeded(context, &action.id, OffsetDateTime::now_utc()).await?;
                self.emit(context, &action, &cluster_id, "SUCCEEDED", "").await;
            }
        }
        Ok(())
    }

    async fn terminate(&self, context: &Context, action: &mut Action, status: ActionStatus, reason: &str) -> anyhow::Result<()> {
        let cluster_id = self.owning_cluster(context, action).await?;
        if status == ActionStatus::Cancelled {
            self.depgraph.mark_cancelled(context, &action.id, reason, OffsetDateTime::now_utc()).await?;
        } else {
            self.depgraph.mark_failed(context, &action.id, reason, OffsetDateTime::now_utc()).await?;
        }
        self.emit(context, action, &cluster_id, &format!("{status:?}").to_uppercase(), reason).await;
        Ok(())
    }

    async fn emit(&self, context: &Context, action: &Action, cluster_id: &str, status: &str, reason: &str) {
        let event = Event::new("ACTION", &action.id, &action.name, cluster_id, &action.project)
            .action(format!("{:?}", action.action))
            .status(status)
            .reason(reason);
        let _ = self.events.emit(context, event).await;
    }

    /// Spawns `children`, wires them as dependencies of `parent` (the
    /// composite action waits on every child) and marks `parent` resumable.
    pub(crate) async fn spawn_children(&self, context: &Context, parent: &mut Action, children: Vec<Action>) -> anyhow::Result<()> {
        let now = OffsetDateTime::now_utc();
        let child_ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        for mut child in children {
            child.status = fleetcore_models::ActionStatus::Ready;
            self.store.persist(context, child).await?;
        }
        parent.data.insert("spawned".to_string(), serde_json::Value::Bool(true));
        parent.data.insert(
            "children".to_string(),
            serde_json::Value::Array(child_ids.iter().cloned().map(serde_json::Value::String).collect()),
        );
        self.store.persist(context, parent.clone()).await?;
        self.depgraph
            .add_dependency(context, fleetcore_depgraph::Dependents::ManyParentsOneChild { parents: &child_ids, child: &parent.id }, now)
            .await?;
        Ok(())
    }

    /// Spawns `waves` (each wave waiting on the full previous wave) and makes
    /// `parent` wait on the last wave, per §4.5.2's batching contract. Waves
    /// after the first carry a `start_time` of `pause_between_waves(pause_time)`
    /// multiplied by the wave index, so a wave becoming dependency-`READY`
    /// early still does not get claimed before its pause has elapsed; the
    /// dependency edges alone guarantee ordering, the `start_time` gate adds
    /// the minimum inter-wave spacing.
    pub(crate) async fn spawn_waves(&self, context: &Context, parent: &mut Action, mut waves: Vec<Vec<Action>>, pause_time: u64) -> anyhow::Result<()> {
        let now = OffsetDateTime::now_utc();
        let pause = pause_between_waves(pause_time);
        let mut all_ids: Vec<String> = Vec::new();
        let mut prev_ids: Vec<String> = Vec::new();

        for (wave_index, wave) in waves.iter_mut().enumerate() {
            if wave_index == 0 {
                for child in wave.iter_mut() {
                    child.status = fleetcore_models::ActionStatus::Ready;
                }
            } else {
                for child in wave.iter_mut() {
                    child.start_time = Some(now + time::Duration::seconds(pause.as_secs() as i64 * wave_index as i64));
                }
            }
            let ids: Vec<String> = wave.iter().map(|child| child.id.clone()).collect();
            for child in wave.drain(..) {
                self.store.persist(context, child).await?;
            }
            if wave_index > 0 {
                for child_id in &ids {
                    self.depgraph
                        .add_dependency(context, fleetcore_depgraph::Dependents::ManyParentsOneChild { parents: &prev_ids, child: child_id }, now)
                        .await?;
                }
            }
            all_ids.extend(ids.iter().cloned());
            prev_ids = ids;
        }

        parent.data.insert("spawned".to_string(), serde_json::Value::Bool(true));
        parent.data.insert(
            "children".to_string(),
            serde_json::Value::Array(all_ids.iter().cloned().map(serde_json::Value::String).collect()),
        );
        self.store.persist(context, parent.clone()).await?;

        if !prev_ids.is_empty() {
            self.depgraph
                .add_dependency(context, fleetcore_depgraph::Dependents::ManyParentsOneChild { parents: &prev_ids, child: &parent.id }, now)
                .await?;
        }
        Ok(())
    }

    /// True if every child this action spawned reached `SUCCEEDED`. Used by
    /// the reap phase of composite action bodies.
    pub(crate) async fn children_all_succeeded(&self, context: &Context, parent_id: &str, child_ids: &[String]) -> anyhow::Result<bool> {
        for id in child_ids {
            let child = self.fetch_action(context, id).await?;
            if child.status != ActionStatus::Succeeded {
                slog::warn!(context.logger, "Child action did not succeed"; "parent" => parent_id, "child" => id, "status" => format!("{:?}", child.status));
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn run_body(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        use fleetcore_models::ActionKind::*;
        match action.action {
            ClusterCreate => self.body_cluster_create(context, action).await,
            ClusterDelete => self.body_cluster_delete(context, action).await,
            ClusterAddNodes => self.body_cluster_add_nodes(context, action).await,
            ClusterDelNodes => self.body_cluster_del_nodes(context, action).await,
            ClusterResize => self.body_cluster_resize(context, action).await,
            ClusterScaleIn => self.body_cluster_scale_in(context, action).await,
            ClusterScaleOut => self.body_cluster_scale_out(context, action).await,
            ClusterReplaceNodes => self.body_cluster_replace_nodes(context, action).await,
            ClusterUpdate => self.body_cluster_update(context, action).await,
            ClusterCheck => self.body_cluster_check(context, action).await,
            ClusterRecover => self.body_cluster_recover(context, action).await,
            ClusterAttachPolicy => self.body_cluster_attach_policy(context, action).await,
            ClusterDetachPolicy => self.body_cluster_detach_policy(context, action).await,
            ClusterUpdatePolicy => self.body_cluster_update_policy(context, action).await,
            ClusterOperation => Ok(Outcome::Done),
            NodeCreate => self.body_node_create(context, action).await,
            NodeDelete => self.body_node_delete(context, action).await,
            NodeUpdate => self.body_node_update(context, action).await,
            NodeCheck => self.body_node_check(context, action).await,
            NodeRecover => self.body_node_recover(context, action).await,
            NodeOperation => Ok(Outcome::Done),
        }
    }

    /// Called on every tick, including the reap tick of a composite action
    /// that still holds its locks from the spawn tick (see `Outcome::Pending`
    /// handling in `execute`). Re-acquiring by the same `action_id` is a
    /// no-op against the lock backend: a holder set already containing
    /// `action_id` is returned unchanged rather than treated as contention.
    async fn acquire_locks(&self, context: &Context, action: &Action, engine_id: &str, cluster_id: &str) -> anyhow::Result<LockGuards> {
        use fleetcore_models::ActionKind::*;
        let scope = match action.action {
            ClusterCheck | ClusterRecover => fleetcore_models::LockScope::Shared,
            _ => fleetcore_models::LockScope::Exclusive,
        };

        let cluster = if action.action.targets_cluster() {
            Some(self.locks.acquire_cluster(context, cluster_id, &action.id, scope).await?)
        } else {
            None
        };

        let node_ids = self.node_ids_for_locking(context, action).await?;
        let mut nodes = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            nodes.push(self.locks.acquire_node(context, &node_id, &action.id).await?);
        }

        slog::debug!(context.logger, "Acquired locks for action"; "action_id" => &action.id, "engine_id" => engine_id);
        Ok(LockGuards { cluster, nodes })
    }

    async fn node_ids_for_locking(&self, context: &Context, action: &Action) -> anyhow::Result<Vec<String>> {
        use fleetcore_models::ActionKind::*;
        match action.action {
            NodeCreate | NodeDelete | NodeUpdate | NodeCheck | NodeRecover | NodeOperation => Ok(vec![action.target.clone()]),
            ClusterAddNodes | ClusterDelNodes | ClusterReplaceNodes => Ok(self.action_node_ids(action)),
            ClusterCheck | ClusterRecover => {
                let nodes = self
                    .store
                    .query(context, ListNodes { cluster_id: Some(action.target.clone()), query: ListQuery::scoped(context) })
                    .await?;
                Ok(nodes.into_iter().map(|n| n.id).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn action_node_ids(&self, action: &Action) -> Vec<String> {
        action
            .inputs
            .get("node_ids")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub(crate) async fn owning_cluster(&self, context: &Context, action: &Action) -> anyhow::Result<String> {
        if action.action.targets_cluster() {
            return Ok(action.target.clone());
        }
        let node = self.store.query(context, GetNode::from(action.target.as_str())).await?;
        Ok(node.map(|n| n.cluster_id).unwrap_or_default())
    }

    pub(crate) async fn fetch_action(&self, context: &Context, id: &str) -> anyhow::Result<Action> {
        let action = self.store.query(context, GetAction::from(id)).await?;
        action.ok_or_else(|| EngineError::from(NotFound::new("action", id)).into())
    }

    pub(crate) async fn fetch_cluster(&self, context: &Context, id: &str) -> anyhow::Result<fleetcore_models::Cluster> {
        let cluster = self.store.query(context, GetCluster::from(id)).await?;
        cluster.ok_or_else(|| EngineError::from(NotFound::new("cluster", id)).into())
    }

    pub(crate) async fn fetch_node(&self, context: &Context, id: &str) -> anyhow::Result<fleetcore_models::Node> {
        let node = self.store.query(context, GetNode::from(id)).await?;
        node.ok_or_else(|| EngineError::from(NotFound::new("node", id)).into())
    }
}

fn veto_reason(action: &Action) -> Option<String> {
    if action.data.get("status").and_then(|v| v.as_str()) == Some("ERROR") {
        let reason = action.data.get("reason").and_then(|v| v.as_str()).unwrap_or("policy vetoed action").to_string();
        return Some(reason);
    }
    None
}

struct LockGuards {
    cluster: Option<fleetcore_locks::ClusterGuard>,
    nodes: Vec<fleetcore_locks::NodeGuard>,
}

impl LockGuards {
    async fn release(self, context: &Context) {
        if let Some(cluster) = self.cluster {
            let _ = cluster.release(context).await;
        }
        for node in self.nodes {
            let _ = node.release(context).await;
        }
    }

    /// Leaves every lock held (the holding action is still the record of
    /// ownership in the store); drops the in-memory guards without running
    /// their best-effort release.
    fn forget(self) {
        if let Some(cluster) = self.cluster {
            std::mem::forget(cluster);
        }
        for node in self.nodes {
            std::mem::forget(node);
        }
    }
}
