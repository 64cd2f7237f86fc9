use fleetcore_models::LockScope;
use fleetcore_store::Store;

/// A held cluster lock.
///
/// Dropping the guard without calling [`ClusterGuard::release`] logs a
/// warning and best-effort releases the lock on a detached task, mirroring
/// how a held-but-abandoned lock is handled elsewhere in this codebase: a
/// panicking handler must not leak a lock forever, but the release itself
/// cannot be awaited from `Drop`.
pub struct ClusterGuard {
    store: Store,
    logger: slog::Logger,
    cluster_id: String,
    action_id: String,
    scope: LockScope,
    released: bool,
}

impl ClusterGuard {
    pub(crate) fn new(store: Store, logger: slog::Logger, cluster_id: String, action_id: String, scope: LockScope) -> Self {
        ClusterGuard {
            store,
            logger,
            cluster_id,
            action_id,
            scope,
            released: false,
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn scope(&self) -> LockScope {
        self.scope
    }

    /// Lightweight check that this guard is still the (or a) current holder.
    ///
    /// A `false` result means the lock was stolen out from under this
    /// action; callers should treat this as `LockLost` at their next
    /// checkpoint.
    pub async fn check(&self, context: &fleetcore_context::Context) -> anyhow::Result<bool> {
        let holders = self.store.cluster_lock_holders(context, &self.cluster_id).await?;
        Ok(holders.contains(&self.action_id))
    }

    pub async fn release(mut self, context: &fleetcore_context::Context) -> anyhow::Result<bool> {
        self.released = true;
        self.store.cluster_lock_release(context, &self.cluster_id, &self.action_id).await
    }
}

impl Drop for ClusterGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        slog::warn!(
            self.logger,
            "Cluster lock guard dropped without an explicit release";
            "cluster_id" => &self.cluster_id,
            "action_id" => &self.action_id,
        );
        let store = self.store.clone();
        let cluster_id = self.cluster_id.clone();
        let action_id = self.action_id.clone();
        let context = fleetcore_context::Context::root(self.logger.clone()).build();
        tokio::spawn(async move {
            let _ = store.cluster_lock_release(&context, &cluster_id, &action_id).await;
        });
    }
}

/// A held node lock. See [`ClusterGuard`] for the drop/release contract.
pub struct NodeGuard {
    store: Store,
    logger: slog::Logger,
    node_id: String,
    action_id: String,
    released: bool,
}

impl NodeGuard {
    pub(crate) fn new(store: Store, logger: slog::Logger, node_id: String, action_id: String) -> Self {
        NodeGuard {
            store,
            logger,
            node_id,
            action_id,
            released: false,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub async fn check(&self, context: &fleetcore_context::Context) -> anyhow::Result<bool> {
        let holder = self.store.node_lock_holder(context, &self.node_id).await?;
        Ok(holder.as_deref() == Some(self.action_id.as_str()))
    }

    pub async fn release(mut self, context: &fleetcore_context::Context) -> anyhow::Result<bool> {
        self.released = true;
        self.store.node_lock_release(context, &self.node_id, &self.action_id).await
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        slog::warn!(
            self.logger,
            "Node lock guard dropped without an explicit release";
            "node_id" => &self.node_id,
            "action_id" => &self.action_id,
        );
        let store = self.store.clone();
        let node_id = self.node_id.clone();
        let action_id = self.action_id.clone();
        let context = fleetcore_context::Context::root(self.logger.clone()).build();
        tokio::spawn(async move {
            let _ = store.node_lock_release(&context, &node_id, &action_id).await;
        });
    }
}
