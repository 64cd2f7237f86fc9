//! Cluster/node lock acquisition built on top of [`fleetcore_store`]'s atomic
//! CAS primitives.
//!
//! The [`LockManager`] adds the two things the bare Store contract does not:
//! retrying a contended acquire up to a configured number of times, and an
//! ergonomic [`ClusterGuard`]/[`NodeGuard`] that releases on [`Drop`] so a
//! panicking or early-returning action handler cannot leak a held lock.
mod conf;
mod guard;

pub use self::conf::LocksConf;
pub use self::guard::ClusterGuard;
pub use self::guard::NodeGuard;

use fleetcore_context::Context;
use fleetcore_errors::EngineError;
use fleetcore_errors::LockContention;
use fleetcore_models::LockScope;
use fleetcore_store::Store;

/// Acquires and releases cluster/node locks, retrying contention per
/// [`LocksConf`].
#[derive(Clone)]
pub struct LockManager {
    store: Store,
    conf: LocksConf,
}

impl LockManager {
    pub fn new(store: Store, conf: LocksConf) -> Self {
        LockManager { store, conf }
    }

    /// Acquires a cluster lock, retrying on contention up to
    /// `conf.retry_times` with `conf.retry_interval` spacing.
    pub async fn acquire_cluster(
        &self,
        context: &Context,
        cluster_id: &str,
        action_id: &str,
        scope: LockScope,
    ) -> Result<ClusterGuard, EngineError> {
        let mut attempt = 0u16;
        loop {
            let holders = self
                .store
                .cluster_lock_acquire(context, cluster_id, action_id, scope)
                .await
                .map_err(store_error)?;
            if holders.contains(action_id) {
                return Ok(ClusterGuard::new(
                    self.store.clone(),
                    context.logger.clone(),
                    cluster_id.to_string(),
                    action_id.to_string(),
                    scope,
                ));
            }
            attempt += 1;
            if attempt > self.conf.retry_times {
                return Err(LockContention::new("cluster", cluster_id.to_string()).into());
            }
            slog::warn!(
                context.logger,
                "Cluster lock contended, retrying";
                "cluster_id" => cluster_id,
                "attempt" => attempt,
            );
            tokio::time::sleep(self.conf.retry_interval).await;
        }
    }

    /// Unconditionally takes the cluster lock away from its current
    /// holder(s). Used only by admin/forced operations.
    pub async fn steal_cluster(&self, context: &Context, cluster_id: &str, action_id: &str) -> Result<ClusterGuard, EngineError> {
        self.store.cluster_lock_steal(context, cluster_id, action_id).await.map_err(store_error)?;
        Ok(ClusterGuard::new(
            self.store.clone(),
            context.logger.clone(),
            cluster_id.to_string(),
            action_id.to_string(),
            LockScope::Exclusive,
        ))
    }

    /// Acquires a node lock, retrying on contention up to `conf.retry_times`.
    pub async fn acquire_node(&self, context: &Context, node_id: &str, action_id: &str) -> Result<NodeGuard, EngineError> {
        let mut attempt = 0u16;
        loop {
            let holder = self.store.node_lock_acquire(context, node_id, action_id).await.map_err(store_error)?;
            if holder == action_id {
                return Ok(NodeGuard::new(self.store.clone(), context.logger.clone(), node_id.to_string(), action_id.to_string()));
            }
            attempt += 1;
            if attempt > self.conf.retry_times {
                return Err(LockContention::new("node", node_id.to_string()).into());
            }
            slog::warn!(
                context.logger,
                "Node lock contended, retrying";
                "node_id" => node_id,
                "attempt" => attempt,
            );
            tokio::time::sleep(self.conf.retry_interval).await;
        }
    }

    pub async fn steal_node(&self, context: &Context, node_id: &str, action_id: &str) -> Result<NodeGuard, EngineError> {
        self.store.node_lock_steal(context, node_id, action_id).await.map_err(store_error)?;
        Ok(NodeGuard::new(self.store.clone(), context.logger.clone(), node_id.to_string(), action_id.to_string()))
    }

    /// Releases every lock held by actions owned by a dead engine. See
    /// [`fleetcore_store::StoreBackend::gc_by_engine`].
    ///
    /// Returns the ids of the actions that held those locks; the caller is
    /// responsible for failing them (and cascading to dependents) through
    /// `fleetcore_depgraph::DependencyGraph`.
    pub async fn sweep_dead_engine(&self, context: &Context, engine_id: &str) -> anyhow::Result<Vec<String>> {
        slog::info!(context.logger, "Sweeping locks held by dead engine"; "engine_id" => engine_id);
        self.store.gc_by_engine(context, engine_id).await
    }
}

fn store_error(error: anyhow::Error) -> EngineError {
    match error.downcast::<EngineError>() {
        Ok(engine_error) => engine_error,
        Err(error) => fleetcore_errors::DriverTransient::new("store", error.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_store::StoreFixture;

    fn ctx() -> Context {
        Context::fixture()
    }

    fn manager() -> LockManager {
        let store: Store = StoreFixture::default().into();
        LockManager::new(store, LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) })
    }

    #[tokio::test]
    async fn acquire_and_release_cluster_lock() {
        let manager = manager();
        let context = ctx();
        let guard = manager.acquire_cluster(&context, "c1", "a1", LockScope::Exclusive).await.unwrap();
        assert!(guard.check(&context).await.unwrap());
        let released = guard.release(&context).await.unwrap();
        assert!(released);
    }

    #[tokio::test]
    async fn contended_exclusive_lock_retries_then_fails() {
        let manager = manager();
        let context = ctx();
        let _holder = manager.acquire_cluster(&context, "c1", "a1", LockScope::Exclusive).await.unwrap();
        let err = manager.acquire_cluster(&context, "c1", "a2", LockScope::Exclusive).await.unwrap_err();
        assert!(matches!(err, EngineError::LockContention(_)));
    }

    #[tokio::test]
    async fn steal_replaces_holders() {
        let manager = manager();
        let context = ctx();
        let first = manager.acquire_cluster(&context, "c1", "a1", LockScope::Exclusive).await.unwrap();
        let stolen = manager.steal_cluster(&context, "c1", "a2").await.unwrap();
        assert!(!first.check(&context).await.unwrap());
        assert!(stolen.check(&context).await.unwrap());
    }

    #[tokio::test]
    async fn node_lock_is_exclusive() {
        let manager = manager();
        let context = ctx();
        let guard = manager.acquire_node(&context, "n1", "a1").await.unwrap();
        let err = manager.acquire_node(&context, "n1", "a2").await.unwrap_err();
        assert!(matches!(err, EngineError::LockContention(_)));
        guard.release(&context).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_dead_engine_fails_owned_actions() {
        let manager = manager();
        let context = ctx();
        let failed = manager.sweep_dead_engine(&context, "engine-1").await.unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn sweep_dead_engine_returns_ids_of_owned_actions_holding_locks() {
        let store: Store = StoreFixture::default().into();
        let manager = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let context = ctx();

        let _guard = manager.acquire_cluster(&context, "c1", "a1", LockScope::Exclusive).await.unwrap();
        let mut action = fleetcore_models::Action::new("a1", "c1", fleetcore_models::ActionKind::ClusterCheck, "proj", 60);
        action.owner = Some("dead-engine".to_string());
        action.status = fleetcore_models::ActionStatus::Running;
        store.persist(&context, action).await.unwrap();

        let failed = manager.sweep_dead_engine(&context, "dead-engine").await.unwrap();
        assert_eq!(failed, vec!["a1".to_string()]);

        let holders = store.cluster_lock_holders(&context, "c1").await.unwrap();
        assert!(holders.is_empty());
    }
}
