//! `CLUSTER_*` action bodies.
use fleetcore_clusterops::plan_waves;
use fleetcore_clusterops::resize;
use fleetcore_clusterops::select_victims;
use fleetcore_clusterops::AdjustmentType;
use fleetcore_clusterops::ResizeRequest;
use fleetcore_context::Context;
use fleetcore_errors::InvalidParameter;
use fleetcore_models::new_id;
use fleetcore_models::Action;
use fleetcore_models::ActionKind;
use fleetcore_models::ClusterStatus;
use fleetcore_models::Node;
use fleetcore_models::NodeStatus;
use fleetcore_store::DeleteCluster;
use fleetcore_store::DeleteClusterPolicyBinding;
use fleetcore_store::GetClusterPolicyBinding;
use fleetcore_store::GetPolicy;
use fleetcore_store::GetProfile;
use fleetcore_store::ListNodes;
use fleetcore_store::ListQuery;
use fleetcore_store::NodeMigrate;

use crate::engine::ActionEngine;
use crate::outcome::Outcome;
use crate::support::is_spawned;
use crate::support::spawned_children;

fn new_cluster_node(cluster: &fleetcore_models::Cluster, index: i64) -> Node {
    let mut node = Node::orphan(new_id(), format!("{}-{}", cluster.name, index), cluster.profile_id.clone());
    node.cluster_id = cluster.id.clone();
    node.project = cluster.project.clone();
    node.index = index;
    node.status = NodeStatus::Init;
    node
}

fn input_str(action: &Action, key: &str) -> Option<String> {
    action.inputs.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn input_node_ids(action: &Action) -> Vec<String> {
    action
        .inputs
        .get("node_ids")
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

impl ActionEngine {
    pub(crate) async fn body_cluster_create(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let mut cluster = self.fetch_cluster(context, &action.target).await?;
            cluster.status = ClusterStatus::Creating;
            self.store.persist(context, cluster.clone()).await?;

            let mut children = Vec::with_capacity(cluster.desired_capacity.max(0) as usize);
            for _ in 0..cluster.desired_capacity {
                let index = self.store.cluster_next_index(context, &cluster.id).await?;
                let node = new_cluster_node(&cluster, index);
                let child = Action::new(new_id(), node.id.clone(), ActionKind::NodeCreate, cluster.project.clone(), cluster.timeout);
                self.store.persist(context, node).await?;
                children.push(child);
            }
            self.spawn_children(context, action, children).await?;
            return Ok(Outcome::Pending);
        }

        self.reap_cluster(context, action, ClusterStatus::Active, ClusterStatus::Error, "one or more nodes failed to create").await
    }

    pub(crate) async fn body_cluster_delete(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let mut cluster = self.fetch_cluster(context, &action.target).await?;
            let nodes = self.store.query(context, ListNodes { cluster_id: Some(cluster.id.clone()), query: ListQuery::scoped(context) }).await?;
            if nodes.is_empty() {
                self.store.delete(context, DeleteCluster::from(cluster.id.as_str())).await?;
                return Ok(Outcome::Done);
            }

            cluster.status = ClusterStatus::Deleting;
            self.store.persist(context, cluster.clone()).await?;

            let children: Vec<Action> = nodes
                .into_iter()
                .map(|node| Action::new(new_id(), node.id, ActionKind::NodeDelete, cluster.project.clone(), cluster.timeout))
                .collect();
            self.spawn_children(context, action, children).await?;
            return Ok(Outcome::Pending);
        }

        let child_ids = spawned_children(action);
        if !self.children_all_succeeded(context, &action.id, &child_ids).await? {
            anyhow::bail!("child NODE_DELETE action failed, cluster left in place");
        }
        self.store.delete(context, DeleteCluster::from(action.target.as_str())).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_add_nodes(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let cluster = self.fetch_cluster(context, &action.target).await?;
        let cluster_profile = self.store.query(context, GetProfile::from(cluster.profile_id.as_str())).await?;
        let cluster_kind = cluster_profile.map(|p| p.kind).unwrap_or_default();

        for node_id in input_node_ids(action) {
            let node = self.fetch_node(context, &node_id).await?;
            if !node.is_orphan() {
                anyhow::bail!("node '{node_id}' is already part of a cluster");
            }
            if node.status != NodeStatus::Active {
                anyhow::bail!("node '{node_id}' is not ACTIVE");
            }
            let node_profile = self.store.query(context, GetProfile::from(node.profile_id.as_str())).await?;
            if node_profile.map(|p| p.kind).unwrap_or_default() != cluster_kind {
                return Err(InvalidParameter::new("node_ids", format!("node '{node_id}' profile type does not match the cluster")).into());
            }
            self.store
                .node_migrate(context, NodeMigrate { node_id, from_cluster: String::new(), to_cluster: cluster.id.clone(), role: String::new() })
                .await?;
        }
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_del_nodes(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let leave = action.inputs.get("leave").and_then(|v| v.as_bool()).unwrap_or(false);
            let kind = if leave { ActionKind::NodeOperation } else { ActionKind::NodeDelete };
            let children: Vec<Action> =
                input_node_ids(action).into_iter().map(|node_id| Action::new(new_id(), node_id, kind, cluster.project.clone(), cluster.timeout)).collect();
            self.spawn_children(context, action, children).await?;
            return Ok(Outcome::Pending);
        }

        let child_ids = spawned_children(action);
        if !self.children_all_succeeded(context, &action.id, &child_ids).await? {
            anyhow::bail!("child node-removal action failed");
        }
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_resize(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let adjustment_type = match input_str(action, "adjustment_type").as_deref() {
                Some("EXACT_CAPACITY") => AdjustmentType::ExactCapacity,
                Some("CHANGE_IN_PERCENTAGE") => AdjustmentType::ChangeInPercentage,
                _ => AdjustmentType::ChangeInCapacity,
            };
            let request = ResizeRequest {
                adjustment_type,
                number: action.inputs.get("number").and_then(|v| v.as_f64()).unwrap_or(0.0),
                min_step: action.inputs.get("min_step").and_then(|v| v.as_i64()),
                strict: action.inputs.get("strict").and_then(|v| v.as_bool()).unwrap_or(false),
                min_size: action.inputs.get("min_size").and_then(|v| v.as_i64()),
                max_size: action.inputs.get("max_size").and_then(|v| v.as_i64()),
            };
            let outcome = resize(&cluster, &request)?;

            let delta = outcome.desired_capacity - cluster.desired_capacity;
            let child_kind = if delta < 0 { ActionKind::ClusterScaleIn } else { ActionKind::ClusterScaleOut };
            let mut child = Action::new(new_id(), cluster.id.clone(), child_kind, cluster.project.clone(), cluster.timeout);
            child.inputs.insert("count".to_string(), serde_json::Value::from(delta.unsigned_abs()));
            child.inputs.insert("desired_capacity".to_string(), serde_json::Value::from(outcome.desired_capacity));
            child.inputs.insert("min_size".to_string(), serde_json::Value::from(outcome.min_size));
            child.inputs.insert("max_size".to_string(), serde_json::Value::from(outcome.max_size));

            self.spawn_children(context, action, vec![child]).await?;
            return Ok(Outcome::Pending);
        }

        let child_ids = spawned_children(action);
        if !self.children_all_succeeded(context, &action.id, &child_ids).await? {
            anyhow::bail!("resize child action failed");
        }
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_scale_in(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let count = action.inputs.get("count").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let batch_size = action.data.get("deletion").and_then(|d| d.get("batch_size")).and_then(|v| v.as_i64()).unwrap_or(-1);
            let pause_time = action.data.get("deletion").and_then(|d| d.get("pause_time")).and_then(|v| v.as_u64()).unwrap_or(0);
            let candidates: Option<Vec<String>> = action
                .data
                .get("deletion")
                .and_then(|d| d.get("candidates"))
                .and_then(|v| v.as_array())
                .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());

            let nodes = self.store.query(context, ListNodes { cluster_id: Some(cluster.id.clone()), query: ListQuery::scoped(context) }).await?;
            let victims: Vec<String> = select_victims(&nodes, count, candidates.as_deref()).into_iter().map(|n| n.id.clone()).collect();

            let waves = plan_waves(victims.len() as u32, batch_size)?;
            let mut remaining = victims.into_iter();
            let mut action_waves = Vec::with_capacity(waves.len());
            for wave in &waves {
                let wave_children: Vec<Action> = (0..wave.size)
                    .filter_map(|_| remaining.next())
                    .map(|node_id| Action::new(new_id(), node_id, ActionKind::NodeDelete, cluster.project.clone(), cluster.timeout))
                    .collect();
                action_waves.push(wave_children);
            }

            if let Some(new_desired) = action.inputs.get("desired_capacity").and_then(|v| v.as_i64()) {
                let mut cluster = cluster;
                cluster.desired_capacity = new_desired;
                self.store.persist(context, cluster).await?;
            }

            self.spawn_waves(context, action, action_waves, pause_time).await?;
            return Ok(Outcome::Pending);
        }

        self.reap_cluster(context, action, ClusterStatus::Active, ClusterStatus::Warning, "one or more nodes failed to delete during scale-in").await
    }

    pub(crate) async fn body_cluster_scale_out(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let mut cluster = self.fetch_cluster(context, &action.target).await?;
            let count = action.inputs.get("count").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let batch_size = action.data.get("creation").and_then(|d| d.get("batch_size")).and_then(|v| v.as_i64()).unwrap_or(-1);
            let pause_time = action.data.get("creation").and_then(|d| d.get("pause_time")).and_then(|v| v.as_u64()).unwrap_or(0);

            let waves = plan_waves(count, batch_size)?;
            let mut action_waves = Vec::with_capacity(waves.len());
            for wave in &waves {
                let mut wave_children = Vec::with_capacity(wave.size as usize);
                for _ in 0..wave.size {
                    let index = self.store.cluster_next_index(context, &cluster.id).await?;
                    let node = new_cluster_node(&cluster, index);
                    let child = Action::new(new_id(), node.id.clone(), ActionKind::NodeCreate, cluster.project.clone(), cluster.timeout);
                    self.store.persist(context, node).await?;
                    wave_children.push(child);
                }
                action_waves.push(wave_children);
            }

            if let Some(new_desired) = action.inputs.get("desired_capacity").and_then(|v| v.as_i64()) {
                cluster.desired_capacity = new_desired;
                self.store.persist(context, cluster).await?;
            }

            self.spawn_waves(context, action, action_waves, pause_time).await?;
            return Ok(Outcome::Pending);
        }

        self.reap_cluster(context, action, ClusterStatus::Active, ClusterStatus::Warning, "one or more nodes failed to create during scale-out").await
    }

    pub(crate) async fn body_cluster_replace_nodes(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let mut children = Vec::new();
            for node_id in input_node_ids(action) {
                children.push(Action::new(new_id(), node_id, ActionKind::NodeDelete, cluster.project.clone(), cluster.timeout));
            }
            let replacement_count = children.len();
            for _ in 0..replacement_count {
                let index = self.store.cluster_next_index(context, &cluster.id).await?;
                let node = new_cluster_node(&cluster, index);
                children.push(Action::new(new_id(), node.id.clone(), ActionKind::NodeCreate, cluster.project.clone(), cluster.timeout));
                self.store.persist(context, node).await?;
            }
            self.spawn_children(context, action, children).await?;
            return Ok(Outcome::Pending);
        }

        self.reap_cluster(context, action, ClusterStatus::Active, ClusterStatus::Warning, "one or more nodes failed during replacement").await
    }

    pub(crate) async fn body_cluster_update(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let pause_time = action.data.get("update").and_then(|u| u.get("pause_time")).and_then(|v| v.as_u64()).unwrap_or(0);
            let plan: Vec<Vec<String>> = action
                .data
                .get("update")
                .and_then(|u| u.get("plan"))
                .and_then(|v| v.as_array())
                .map(|waves| {
                    waves
                        .iter()
                        .map(|wave| {
                            wave.as_array()
                                .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .unwrap_or_default();

            let action_waves: Vec<Vec<Action>> = plan
                .into_iter()
                .map(|wave| {
                    wave.into_iter()
                        .map(|node_id| Action::new(new_id(), node_id, ActionKind::NodeUpdate, cluster.project.clone(), cluster.timeout))
                        .collect()
                })
                .collect();

            self.spawn_waves(context, action, action_waves, pause_time).await?;
            return Ok(Outcome::Pending);
        }

        self.reap_cluster(context, action, ClusterStatus::Active, ClusterStatus::Warning, "one or more nodes failed to update").await
    }

    pub(crate) async fn body_cluster_check(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        self.fan_out_to_nodes(context, action, ActionKind::NodeCheck).await
    }

    pub(crate) async fn body_cluster_recover(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        self.fan_out_to_nodes(context, action, ActionKind::NodeRecover).await
    }

    async fn fan_out_to_nodes(&self, context: &Context, action: &mut Action, kind: ActionKind) -> anyhow::Result<Outcome> {
        if !is_spawned(action) {
            let cluster = self.fetch_cluster(context, &action.target).await?;
            let nodes = self.store.query(context, ListNodes { cluster_id: Some(cluster.id.clone()), query: ListQuery::scoped(context) }).await?;
            if nodes.is_empty() {
                return Ok(Outcome::Done);
            }
            let children: Vec<Action> =
                nodes.into_iter().map(|node| Action::new(new_id(), node.id, kind, cluster.project.clone(), cluster.timeout)).collect();
            self.spawn_children(context, action, children).await?;
            return Ok(Outcome::Pending);
        }

        let child_ids = spawned_children(action);
        if !self.children_all_succeeded(context, &action.id, &child_ids).await? {
            anyhow::bail!("one or more node actions failed during cluster-wide fan-out");
        }
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_attach_policy(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let cluster = self.fetch_cluster(context, &action.target).await?;
        let policy_id = input_str(action, "policy_id").ok_or_else(|| anyhow::anyhow!("policy_id is required"))?;
        let priority = action.inputs.get("priority").and_then(|v| v.as_i64()).unwrap_or(100) as i32;
        let policy = self
            .store
            .query(context, GetPolicy::from(policy_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("policy", policy_id.clone()))?;

        let mut binding = fleetcore_models::ClusterPolicyBinding::new(cluster.id.clone(), policy_id.clone(), priority);
        let accepted = self.policy.attach(context, &policy.kind, &policy.version, &cluster, &mut binding).await?;
        if !accepted {
            anyhow::bail!("policy '{policy_id}' refused to attach to cluster '{}'", cluster.id);
        }
        self.store.persist(context, binding).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_detach_policy(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let cluster = self.fetch_cluster(context, &action.target).await?;
        let policy_id = input_str(action, "policy_id").ok_or_else(|| anyhow::anyhow!("policy_id is required"))?;
        let mut binding = self
            .store
            .query(context, GetClusterPolicyBinding { cluster_id: cluster.id.clone(), policy_id: policy_id.clone() })
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("cluster_policy_binding", policy_id.clone()))?;
        let policy = self
            .store
            .query(context, GetPolicy::from(policy_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("policy", policy_id.clone()))?;

        self.policy.detach(context, &policy.kind, &policy.version, &cluster, &mut binding).await?;
        self.store.delete(context, DeleteClusterPolicyBinding { cluster_id: cluster.id.clone(), policy_id }).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_cluster_update_policy(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let policy_id = input_str(action, "policy_id").ok_or_else(|| anyhow::anyhow!("policy_id is required"))?;
        let mut binding = self
            .store
            .query(context, GetClusterPolicyBinding { cluster_id: action.target.clone(), policy_id: policy_id.clone() })
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("cluster_policy_binding", policy_id))?;

        if let Some(priority) = action.inputs.get("priority").and_then(|v| v.as_i64()) {
            binding.priority = priority as i32;
        }
        if let Some(enabled) = action.inputs.get("enabled").and_then(|v| v.as_bool()) {
            binding.enabled = enabled;
        }
        self.store.persist(context, binding).await?;
        Ok(Outcome::Done)
    }

    /// Shared reap-phase tail: on full child success sets `cluster.status` to
    /// `on_success`, otherwise to `on_failure` and fails the parent action
    /// with `failure_reason`. CLUSTER_CREATE passes `Error` here since a
    /// cluster that never finished creating was never ACTIVE; the
    /// already-ACTIVE operations (scale-in/out, replace, update) pass
    /// `Warning` since the cluster stays usable with a partial result.
    async fn reap_cluster(
        &self,
        context: &Context,
        action: &Action,
        on_success: ClusterStatus,
        on_failure: ClusterStatus,
        failure_reason: &str,
    ) -> anyhow::Result<Outcome> {
        let child_ids = spawned_children(action);
        let mut cluster = self.fetch_cluster(context, &action.target).await?;
        if self.children_all_succeeded(context, &action.id, &child_ids).await? {
            cluster.status = on_success;
            self.store.persist(context, cluster).await?;
            Ok(Outcome::Done)
        } else {
            cluster.status = on_failure;
            cluster.status_reason = failure_reason.to_string();
            self.store.persist(context, cluster).await?;
            anyhow::bail!("{failure_reason}")
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_driver::DriverFixture;
    use fleetcore_driver::DriverMetadata;
    use fleetcore_driver::DriverRegistry;
    use fleetcore_events::Events;
    use fleetcore_events::EventsFixture;
    use fleetcore_locks::LockManager;
    use fleetcore_locks::LocksConf;
    use fleetcore_models::Action;
    use fleetcore_models::ActionKind;
    use fleetcore_models::ActionStatus;
    use fleetcore_models::Cluster;
    use fleetcore_models::Profile;
    use fleetcore_policy::PolicyChecker;
    use fleetcore_policy::PolicyRegistry;
    use fleetcore_store::GetAction;
    use fleetcore_store::Store;
    use fleetcore_store::StoreFixture;

    use super::new_cluster_node;
    use super::ActionEngine;

    fn engine(store: Store) -> ActionEngine {
        let locks = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let mut drivers = DriverRegistry::build();
        drivers.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
        let policy = PolicyChecker::new(store.clone(), PolicyRegistry::build().finish());
        let events: Events = EventsFixture::new().backend().into();
        ActionEngine::new(store, locks, drivers.finish(), policy, events)
    }

    async fn seed_cluster_with_node(store: &Store, context: &Context, project: &str) -> Cluster {
        let profile = Profile::new("p1", "profile-1", "os.nova.server", project);
        store.persist(context, profile).await.unwrap();
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", project, 0, 10, 1).unwrap();
        store.persist(context, cluster.clone()).await.unwrap();
        let node = new_cluster_node(&cluster, 1);
        store.persist(context, node).await.unwrap();
        cluster
    }

    /// Exercises the real call path (context -> `ActionEngine::execute` ->
    /// `fan_out_to_nodes` -> `store.query`), not a hand-built `ListQuery`.
    /// A non-admin caller scoped to a different project than the cluster
    /// must not see its nodes, so the CLUSTER_CHECK fan-out finds nothing
    /// and completes without spawning any children.
    #[tokio::test]
    async fn cluster_check_does_not_see_nodes_outside_caller_project() {
        let store: Store = StoreFixture::default().into();
        let admin = Context::fixture();
        seed_cluster_with_node(&store, &admin, "proj-a").await;
        let engine = engine(store.clone());

        let other_project = Context::root(admin.logger.clone()).project("proj-b").build();
        let mut action = Action::new("a1", "c1", ActionKind::ClusterCheck, "proj-a", 60);
        action.status = ActionStatus::Running;
        store.persist(&other_project, action).await.unwrap();

        engine.execute(&other_project, "a1", "engine-1").await.unwrap();

        let action = store.query(&other_project, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Succeeded);
        assert!(action.data.get("children").is_none(), "no children should have been spawned for an out-of-project node set");
    }

    /// Same cluster, same-project caller: the node is visible and a
    /// NODE_CHECK child gets spawned.
    #[tokio::test]
    async fn cluster_check_sees_nodes_in_caller_project() {
        let store: Store = StoreFixture::default().into();
        let admin = Context::fixture();
        seed_cluster_with_node(&store, &admin, "proj-a").await;
        let engine = engine(store.clone());

        let same_project = Context::root(admin.logger.clone()).project("proj-a").build();
        let mut action = Action::new("a1", "c1", ActionKind::ClusterCheck, "proj-a", 60);
        action.status = ActionStatus::Running;
        store.persist(&same_project, action).await.unwrap();

        engine.execute(&same_project, "a1", "engine-1").await.unwrap();

        let action = store.query(&same_project, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Waiting);
        let children = action.data.get("children").unwrap().as_array().unwrap();
        assert_eq!(children.len(), 1);
    }

    /// A batch_size: 1 scale-in over 2 nodes spawns 2 waves. Completing
    /// wave 1's child makes wave 2's child dependency-`READY`, but its
    /// `start_time` (set a full `pause_time` in the future) must still keep
    /// it unclaimable until the pause elapses.
    #[tokio::test]
    async fn scale_in_wave_2_child_cannot_be_claimed_before_its_start_time() {
        let store: Store = StoreFixture::default().into();
        let context = Context::fixture();
        let cluster = seed_cluster_with_node(&store, &context, "proj-a").await;
        let node2 = new_cluster_node(&cluster, 2);
        store.persist(&context, node2).await.unwrap();
        let engine = engine(store.clone());

        let mut action = Action::new("a1", "c1", ActionKind::ClusterScaleIn, "proj-a", 60);
        action.status = ActionStatus::Running;
        action.inputs.insert("count".to_string(), serde_json::Value::from(2));
        action.data.insert(
            "deletion".to_string(),
            serde_json::json!({"batch_size": 1, "pause_time": 3600}),
        );
        store.persist(&context, action).await.unwrap();

        engine.execute(&context, "a1", "engine-1").await.unwrap();

        let parent = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(parent.status, ActionStatus::Waiting);
        let child_ids: Vec<String> = parent.data.get("children").unwrap().as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        assert_eq!(child_ids.len(), 2);

        let mut wave1_id = None;
        let mut wave2_id = None;
        for id in &child_ids {
            let child = store.query(&context, GetAction::from(id.as_str())).await.unwrap().unwrap();
            if child.depends_on.is_empty() {
                wave1_id = Some(id.clone());
            } else {
                wave2_id = Some(id.clone());
            }
        }
        let wave1_id = wave1_id.expect("one child should have no dependencies");
        let wave2_id = wave2_id.expect("one child should depend on the other");
        assert_ne!(wave1_id, wave2_id);

        let mut wave1 = store.query(&context, GetAction::from(wave1_id.as_str())).await.unwrap().unwrap();
        wave1.status = ActionStatus::Running;
        store.persist(&context, wave1).await.unwrap();
        engine.execute(&context, &wave1_id, "engine-1").await.unwrap();

        let wave2 = store.query(&context, GetAction::from(wave2_id.as_str())).await.unwrap().unwrap();
        assert_eq!(wave2.status, ActionStatus::Ready, "wave 2's child should be dependency-ready once wave 1 succeeds");
        assert!(wave2.start_time.is_some());

        let claimed = store.claim_action(&context, &wave2_id, "engine-1").await.unwrap();
        assert!(claimed.is_none(), "wave 2's child must not be claimable before its start_time");

        let ready = store.query(&context, fleetcore_store::ListActionsReady).await.unwrap();
        assert!(!ready.iter().any(|a| a.id == wave2_id), "wave 2's child should not appear among ready actions before its start_time");
    }
}
