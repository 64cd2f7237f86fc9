use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fleetcore_context::Context;
use fleetcore_errors::EngineError;
use fleetcore_models::Action;
use fleetcore_models::ActionStatus;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterLock;
use fleetcore_models::ClusterPolicyBinding;
use fleetcore_models::Credential;
use fleetcore_models::HealthCheck;
use fleetcore_models::LockScope;
use fleetcore_models::Node;
use fleetcore_models::NodeLock;
use fleetcore_models::Policy;
use fleetcore_models::Profile;
use fleetcore_models::Service;
use fleetcore_models::StoredEvent;
use time::OffsetDateTime;

use crate::delete::DeleteOps;
use crate::delete::DeleteResponses;
use crate::pagination::paginate;
use crate::pagination::Sortable;
use crate::persist::PersistOps;
use crate::persist::PersistResponses;
use crate::query::resolve_prefix;
use crate::query::QueryOps;
use crate::query::QueryResponses;
use crate::NodeMigrate;
use crate::StoreBackend;

impl Sortable for Cluster {
    fn id(&self) -> &str {
        &self.id
    }
    fn sort_value(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "created_at" => Some(self.created_at.unix_timestamp().to_string()),
            "status" => Some(format!("{:?}", self.status)),
            _ => None,
        }
    }
    fn project(&self) -> &str {
        &self.project
    }
}

impl Sortable for Node {
    fn id(&self) -> &str {
        &self.id
    }
    fn sort_value(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "index" => Some(format!("{:020}", self.index)),
            "created_at" => Some(self.created_at.unix_timestamp().to_string()),
            _ => None,
        }
    }
    fn project(&self) -> &str {
        &self.project
    }
}

/// In-memory [`StoreBackend`] used by tests and by any component exercising
/// the engine end to end without a real persistence backend wired up.
#[derive(Default)]
pub struct StoreFixture {
    inner: Mutex<StoreFixtureState>,
}

#[derive(Default)]
struct StoreFixtureState {
    profiles: HashMap<String, Profile>,
    clusters: HashMap<String, Cluster>,
    nodes: HashMap<String, Node>,
    policies: HashMap<String, Policy>,
    bindings: HashMap<(String, String), ClusterPolicyBinding>,
    credentials: HashMap<(String, String), Credential>,
    services: HashMap<String, Service>,
    actions: HashMap<String, Action>,
    health_checks: HashMap<String, HealthCheck>,
    events: HashMap<String, StoredEvent>,
    cluster_locks: HashMap<String, ClusterLock>,
    node_locks: HashMap<String, NodeLock>,
}

impl StoreFixture {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreFixtureState> {
        self.inner.lock().expect("fixture mutex poisoned")
    }
}

#[async_trait]
impl StoreBackend for StoreFixture {
    async fn persist(&self, _context: &Context, op: PersistOps) -> anyhow::Result<PersistResponses> {
        let mut state = self.lock();
        match op {
            PersistOps::Action(action) => {
                state.actions.insert(action.id.clone(), *action);
            }
            PersistOps::Cluster(cluster) => {
                state.clusters.insert(cluster.id.clone(), *cluster);
            }
            PersistOps::ClusterPolicyBinding(binding) => {
                state
                    .bindings
                    .insert((binding.cluster_id.clone(), binding.policy_id.clone()), *binding);
            }
            PersistOps::Credential(cred) => {
                state.credentials.insert((cred.user.clone(), cred.project.clone()), *cred);
            }
            PersistOps::HealthCheck(health_check) => {
                state.health_checks.insert(health_check.id.clone(), *health_check);
            }
            PersistOps::Node(node) => {
                state.nodes.insert(node.id.clone(), *node);
            }
            PersistOps::Policy(policy) => {
                state.policies.insert(policy.id.clone(), *policy);
            }
            PersistOps::Profile(profile) => {
                state.profiles.insert(profile.id.clone(), *profile);
            }
            PersistOps::Service(service) => {
                state.services.insert(service.id.clone(), *service);
            }
            PersistOps::StoredEvent(event) => {
                state.events.insert(event.id.clone(), *event);
            }
        }
        Ok(PersistResponses::Success)
    }

    async fn delete(&self, _context: &Context, op: DeleteOps) -> anyhow::Result<DeleteResponses> {
        let mut state = self.lock();
        match op {
            DeleteOps::Profile(op) => {
                state.profiles.remove(&op.id);
            }
            DeleteOps::Cluster(op) => {
                if let Some(cluster) = state.clusters.get_mut(&op.id) {
                    cluster.deleted_at = Some(OffsetDateTime::now_utc());
                }
            }
            DeleteOps::Node(op) => {
                if let Some(node) = state.nodes.get_mut(&op.id) {
                    node.deleted_at = Some(OffsetDateTime::now_utc());
                }
            }
            DeleteOps::Policy(op) => {
                state.policies.remove(&op.id);
            }
            DeleteOps::ClusterPolicyBinding(op) => {
                state.bindings.remove(&(op.cluster_id, op.policy_id));
            }
            DeleteOps::Credential(op) => {
                state.credentials.remove(&(op.user, op.project));
            }
            DeleteOps::Service(op) => {
                state.services.remove(&op.id);
            }
            DeleteOps::HealthCheck(op) => {
                state.health_checks.remove(&op.id);
            }
        }
        Ok(DeleteResponses::Success)
    }

    async fn query(&self, _context: &Context, op: QueryOps) -> anyhow::Result<QueryResponses> {
        let state = self.lock();
        let response = match op {
            QueryOps::GetProfile(op) => {
                let rows: Vec<&Profile> = state.profiles.values().collect();
                let found = resolve_prefix(&rows, &op.id_or_prefix, "profile", |row: &&Profile| row.id.as_str())?;
                QueryResponses::Profile(found.map(|row| (*row).clone()))
            }
            QueryOps::GetCluster(op) => {
                let rows: Vec<&Cluster> = state.clusters.values().filter(|c| !c.is_deleted()).collect();
                let found = resolve_prefix(&rows, &op.id_or_prefix, "cluster", |row: &&Cluster| row.id.as_str())?;
                QueryResponses::Cluster(found.map(|row| (*row).clone()))
            }
            QueryOps::GetNode(op) => {
                let rows: Vec<&Node> = state.nodes.values().filter(|n| !n.is_deleted()).collect();
                let found = resolve_prefix(&rows, &op.id_or_prefix, "node", |row: &&Node| row.id.as_str())?;
                QueryResponses::Node(found.map(|row| (*row).clone()))
            }
            QueryOps::GetPolicy(op) => {
                let rows: Vec<&Policy> = state.policies.values().collect();
                let found = resolve_prefix(&rows, &op.id_or_prefix, "policy", |row: &&Policy| row.id.as_str())?;
                QueryResponses::Policy(found.map(|row| (*row).clone()))
            }
            QueryOps::GetClusterPolicyBinding(op) => {
                let found = state.bindings.get(&(op.cluster_id, op.policy_id)).cloned();
                QueryResponses::ClusterPolicyBinding(found)
            }
            QueryOps::GetCredential(op) => {
                let found = state.credentials.get(&(op.user, op.project)).cloned();
                QueryResponses::Credential(found)
            }
            QueryOps::GetService(op) => QueryResponses::Service(state.services.get(&op.id).cloned()),
            QueryOps::ListServices(_) => QueryResponses::Services(state.services.values().cloned().collect()),
            QueryOps::GetAction(op) => QueryResponses::Action(state.actions.get(&op.id).cloned()),
            QueryOps::ListClusters(op) => {
                let rows: Vec<Cluster> = state.clusters.values().filter(|c| !c.is_deleted()).cloned().collect();
                QueryResponses::Clusters(paginate(rows, &op.query)?)
            }
            QueryOps::ListNodes(op) => {
                let rows: Vec<Node> = state
                    .nodes
                    .values()
                    .filter(|n| !n.is_deleted())
                    .filter(|n| op.cluster_id.as_deref().map(|id| id == n.cluster_id).unwrap_or(true))
                    .cloned()
                    .collect();
                QueryResponses::Nodes(paginate(rows, &op.query)?)
            }
            QueryOps::ListActionsReady(_) => {
                let now = OffsetDateTime::now_utc();
                let rows: Vec<Action> = state
                    .actions
                    .values()
                    .filter(|a| a.is_ready(now))
                    .cloned()
                    .collect();
                QueryResponses::Actions(rows)
            }
            QueryOps::ListActionsByOwner(op) => {
                let rows: Vec<Action> = state
                    .actions
                    .values()
                    .filter(|a| a.owner.as_deref() == Some(op.owner.as_str()))
                    .cloned()
                    .collect();
                QueryResponses::Actions(rows)
            }
            QueryOps::ListClusterPolicyBindings(op) => {
                let mut rows: Vec<ClusterPolicyBinding> = state
                    .bindings
                    .values()
                    .filter(|b| b.cluster_id == op.cluster_id)
                    .cloned()
                    .collect();
                rows.sort_by_key(|b| b.priority);
                QueryResponses::Bindings(rows)
            }
            QueryOps::GetHealthCheck(op) => QueryResponses::HealthCheck(state.health_checks.get(&op.id).cloned()),
            QueryOps::ListHealthChecks(op) => {
                let rows: Vec<HealthCheck> = state
                    .health_checks
                    .values()
                    .filter(|h| op.cluster_id.as_deref().map(|id| id == h.cluster_id).unwrap_or(true))
                    .filter(|h| op.check_type.as_deref().map(|t| t == h.check_type).unwrap_or(true))
                    .cloned()
                    .collect();
                QueryResponses::HealthChecks(rows)
            }
        };
        Ok(response)
    }

    async fn cluster_next_index(&self, _context: &Context, cluster_id: &str) -> anyhow::Result<i64> {
        let mut state = self.lock();
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| EngineError::from(fleetcore_errors::NotFound::new("cluster", cluster_id)))?;
        let previous = cluster.next_index;
        cluster.next_index += 1;
        Ok(previous)
    }

    async fn node_migrate(&self, _context: &Context, args: NodeMigrate) -> anyhow::Result<()> {
        let mut state = self.lock();
        if !state.nodes.contains_key(&args.node_id) {
            return Err(EngineError::from(fleetcore_errors::NotFound::new("node", args.node_id.as_str())).into());
        }
        let (new_index, new_project) = if args.to_cluster.is_empty() {
            (fleetcore_models::ORPHAN_INDEX, String::new())
        } else {
            let cluster = state
                .clusters
                .get_mut(&args.to_cluster)
                .ok_or_else(|| EngineError::from(fleetcore_errors::NotFound::new("cluster", args.to_cluster.as_str())))?;
            let index = cluster.next_index;
            cluster.next_index += 1;
            (index, cluster.project.clone())
        };
        let node = state.nodes.get_mut(&args.node_id).expect("checked above");
        node.cluster_id = args.to_cluster;
        node.project = new_project;
        node.role = args.role;
        node.index = new_index;
        node.updated_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn event_prune(&self, _context: &Context, cluster_id: &str) -> anyhow::Result<u64> {
        let mut state = self.lock();
        let before = state.events.len();
        state.events.retain(|_, event| event.cluster_id != cluster_id);
        Ok((before - state.events.len()) as u64)
    }

    async fn event_purge(&self, _context: &Context, project: &str, age: time::Duration) -> anyhow::Result<u64> {
        let mut state = self.lock();
        let cutoff = OffsetDateTime::now_utc() - age;
        let before = state.events.len();
        state
            .events
            .retain(|_, event| !(event.project == project && event.timestamp < cutoff));
        Ok((before - state.events.len()) as u64)
    }

    async fn gc_by_engine(&self, _context: &Context, engine_id: &str) -> anyhow::Result<Vec<String>> {
        let mut state = self.lock();
        let dead_action_ids: Vec<String> = state
            .actions
            .values()
            .filter(|a| a.owner.as_deref() == Some(engine_id) && !a.status.is_terminal())
            .map(|a| a.id.clone())
            .collect();
        let dead: BTreeSet<String> = dead_action_ids.iter().cloned().collect();
        state.cluster_locks.retain(|_, lock| {
            lock.action_ids.retain(|id| !dead.contains(id));
            !lock.action_ids.is_empty()
        });
        state.node_locks.retain(|_, lock| !dead.contains(&lock.action_id));
        Ok(dead_action_ids)
    }

    async fn cluster_lock_acquire(
        &self,
        _context: &Context,
        cluster_id: &str,
        action_id: &str,
        scope: LockScope,
    ) -> anyhow::Result<BTreeSet<String>> {
        let mut state = self.lock();
        let entry = state.cluster_locks.entry(cluster_id.to_string()).or_insert_with(|| ClusterLock {
            cluster_id: cluster_id.to_string(),
            action_ids: BTreeSet::new(),
            scope,
        });
        let compatible = entry.action_ids.is_empty()
            || (entry.scope == LockScope::Shared && scope == LockScope::Shared);
        if compatible {
            entry.scope = scope;
            entry.action_ids.insert(action_id.to_string());
        }
        Ok(entry.action_ids.clone())
    }

    async fn cluster_lock_release(&self, _context: &Context, cluster_id: &str, action_id: &str) -> anyhow::Result<bool> {
        let mut state = self.lock();
        let Some(entry) = state.cluster_locks.get_mut(cluster_id) else {
            return Ok(false);
        };
        let removed = entry.action_ids.remove(action_id);
        if entry.action_ids.is_empty() {
            state.cluster_locks.remove(cluster_id);
        }
        Ok(removed)
    }

    async fn cluster_lock_steal(&self, _context: &Context, cluster_id: &str, new_action_id: &str) -> anyhow::Result<BTreeSet<String>> {
        let mut state = self.lock();
        let mut holders = BTreeSet::new();
        holders.insert(new_action_id.to_string());
        state.cluster_locks.insert(
            cluster_id.to_string(),
            ClusterLock {
                cluster_id: cluster_id.to_string(),
                action_ids: holders.clone(),
                scope: LockScope::Exclusive,
            },
        );
        Ok(holders)
    }

    async fn node_lock_acquire(&self, _context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<String> {
        let mut state = self.lock();
        let holder = state
            .node_locks
            .entry(node_id.to_string())
            .or_insert_with(|| NodeLock {
                node_id: node_id.to_string(),
                action_id: action_id.to_string(),
            })
            .action_id
            .clone();
        Ok(holder)
    }

    async fn node_lock_release(&self, _context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<bool> {
        let mut state = self.lock();
        let matches = state.node_locks.get(node_id).map(|lock| lock.action_id == action_id).unwrap_or(false);
        if matches {
            state.node_locks.remove(node_id);
        }
        Ok(matches)
    }

    async fn node_lock_steal(&self, _context: &Context, node_id: &str, new_action_id: &str) -> anyhow::Result<String> {
        let mut state = self.lock();
        state.node_locks.insert(
            node_id.to_string(),
            NodeLock {
                node_id: node_id.to_string(),
                action_id: new_action_id.to_string(),
            },
        );
        Ok(new_action_id.to_string())
    }

    async fn cluster_lock_holders(&self, _context: &Context, cluster_id: &str) -> anyhow::Result<BTreeSet<String>> {
        let state = self.lock();
        Ok(state.cluster_locks.get(cluster_id).map(|lock| lock.action_ids.clone()).unwrap_or_default())
    }

    async fn node_lock_holder(&self, _context: &Context, node_id: &str) -> anyhow::Result<Option<String>> {
        let state = self.lock();
        Ok(state.node_locks.get(node_id).map(|lock| lock.action_id.clone()))
    }

    async fn claim_action(&self, _context: &Context, action_id: &str, engine_id: &str) -> anyhow::Result<Option<Action>> {
        let mut state = self.lock();
        let Some(action) = state.actions.get_mut(action_id) else {
            return Ok(None);
        };
        let now = OffsetDateTime::now_utc();
        if !action.is_ready(now) {
            return Ok(None);
        }
        action.status = ActionStatus::Running;
        action.owner = Some(engine_id.to_string());
        action.start_time = Some(now);
        Ok(Some(action.clone()))
    }

    async fn health_claim(&self, _context: &Context, id: &str, engine_id: &str) -> anyhow::Result<Option<HealthCheck>> {
        let mut state = self.lock();
        let Some(health_check) = state.health_checks.get_mut(id) else {
            return Ok(None);
        };
        if !health_check.is_due(OffsetDateTime::now_utc()) {
            return Ok(None);
        }
        health_check.owner = Some(engine_id.to_string());
        health_check.updated_at = OffsetDateTime::now_utc();
        Ok(Some(health_check.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn ctx() -> Context {
        Context::fixture()
    }

    #[tokio::test]
    async fn cluster_lock_exclusive_excludes_shared() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let holders = store
            .cluster_lock_acquire(&context, "c1", "a1", LockScope::Exclusive)
            .await
            .unwrap();
        assert_eq!(holders.len(), 1);
        let holders = store
            .cluster_lock_acquire(&context, "c1", "a2", LockScope::Shared)
            .await
            .unwrap();
        assert!(!holders.contains("a2"));
    }

    #[tokio::test]
    async fn cluster_lock_shared_allows_multiple_holders() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        store.cluster_lock_acquire(&context, "c1", "a1", LockScope::Shared).await.unwrap();
        let holders = store.cluster_lock_acquire(&context, "c1", "a2", LockScope::Shared).await.unwrap();
        assert!(holders.contains("a1"));
        assert!(holders.contains("a2"));
    }

    #[tokio::test]
    async fn node_lock_is_cas() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let first = store.node_lock_acquire(&context, "n1", "a1").await.unwrap();
        let second = store.node_lock_acquire(&context, "n1", "a2").await.unwrap();
        assert_eq!(first, "a1");
        assert_eq!(second, "a1");
    }

    #[tokio::test]
    async fn release_non_holder_is_noop() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        store.cluster_lock_acquire(&context, "c1", "a1", LockScope::Exclusive).await.unwrap();
        let removed = store.cluster_lock_release(&context, "c1", "a2").await.unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn cluster_next_index_increments_atomically() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let cluster = Cluster::new("c1", "n", "p1", "u", "proj", 0, -1, 1).unwrap();
        store.persist(&context, cluster).await.unwrap();
        let first = store.cluster_next_index(&context, "c1").await.unwrap();
        let second = store.cluster_next_index(&context, "c1").await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn claim_action_respects_future_start_time() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let mut action = Action::new("a1", "c1", fleetcore_models::ActionKind::NodeCreate, "proj", 60);
        action.status = ActionStatus::Ready;
        action.start_time = Some(OffsetDateTime::now_utc() + time::Duration::seconds(60));
        store.persist(&context, action).await.unwrap();

        let claimed = store.claim_action(&context, "a1", "engine-1").await.unwrap();
        assert!(claimed.is_none());

        let ready = store.query(&context, crate::ListActionsReady).await.unwrap();
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn claim_action_succeeds_once_start_time_has_passed() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let mut action = Action::new("a1", "c1", fleetcore_models::ActionKind::NodeCreate, "proj", 60);
        action.status = ActionStatus::Ready;
        action.start_time = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        store.persist(&context, action).await.unwrap();

        let claimed = store.claim_action(&context, "a1", "engine-1").await.unwrap();
        assert!(claimed.is_some());
        assert_eq!(claimed.unwrap().owner.as_deref(), Some("engine-1"));
    }

    #[tokio::test]
    async fn health_claim_only_succeeds_when_due() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let health_check = HealthCheck::new("h1", "c1", "polling", 60);
        store.persist(&context, health_check).await.unwrap();

        let claimed = store.health_claim(&context, "h1", "engine-1").await.unwrap();
        assert!(claimed.is_some());
        assert_eq!(claimed.unwrap().owner.as_deref(), Some("engine-1"));

        let reclaimed = store.health_claim(&context, "h1", "engine-2").await.unwrap();
        assert!(reclaimed.is_none());
    }
}
