//! Durable state for the action execution engine.
//!
//! The [`Store`] is a thin, ergonomic wrapper around a [`StoreBackend`]. Its
//! generic `persist`/`delete`/`query` methods take any type implementing
//! [`PersistOp`]/[`DeleteOp`]/[`QueryOp`], convert it into the matching
//! backend-facing enum, hand it to the backend, and convert the backend's
//! response back into the operation's own `Response` type. This keeps
//! `StoreBackend` implementations to three match statements instead of one
//! method per model, while callers still get a strongly typed API: a
//! `persist(GetCluster)` call simply cannot compile.
//!
//! A handful of operations are not simple CRUD and are modelled as bespoke
//! methods on [`StoreBackend`] directly because each one is a single atomic
//! transaction spanning more than one row: [`StoreBackend::cluster_next_index`],
//! [`StoreBackend::node_migrate`], [`StoreBackend::event_prune`],
//! [`StoreBackend::event_purge`] and [`StoreBackend::gc_by_engine`].
use std::sync::Arc;

use async_trait::async_trait;
use fleetcore_context::Context;

mod delete;
mod fixture;
mod pagination;
mod persist;
mod query;

pub use self::delete::*;
pub use self::pagination::ListQuery;
pub use self::pagination::SortDirection;
pub use self::pagination::SortKey;
pub use self::persist::PersistOp;
pub use self::persist::PersistOps;
pub use self::persist::PersistResponses;
pub use self::query::*;

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::StoreFixture;

/// Ergonomic handle to durable state, backed by any [`StoreBackend`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StoreBackend>,
}

impl Store {
    pub async fn persist<O: PersistOp>(&self, context: &Context, op: O) -> anyhow::Result<O::Response> {
        let response = self.inner.persist(context, op.into()).await?;
        Ok(O::Response::from(response))
    }

    pub async fn delete<O: DeleteOp>(&self, context: &Context, op: O) -> anyhow::Result<O::Response> {
        let response = self.inner.delete(context, op.into()).await?;
        Ok(O::Response::from(response))
    }

    pub async fn query<O: QueryOp>(&self, context: &Context, op: O) -> anyhow::Result<O::Response> {
        let response = self.inner.query(context, op.into()).await?;
        Ok(O::Response::from(response))
    }

    pub async fn cluster_next_index(&self, context: &Context, cluster_id: &str) -> anyhow::Result<i64> {
        self.inner.cluster_next_index(context, cluster_id).await
    }

    pub async fn node_migrate(&self, context: &Context, args: NodeMigrate) -> anyhow::Result<()> {
        self.inner.node_migrate(context, args).await
    }

    pub async fn event_prune(&self, context: &Context, cluster_id: &str) -> anyhow::Result<u64> {
        self.inner.event_prune(context, cluster_id).await
    }

    pub async fn event_purge(&self, context: &Context, project: &str, age: time::Duration) -> anyhow::Result<u64> {
        self.inner.event_purge(context, project, age).await
    }

    pub async fn gc_by_engine(&self, context: &Context, engine_id: &str) -> anyhow::Result<Vec<String>> {
        self.inner.gc_by_engine(context, engine_id).await
    }

    pub async fn cluster_lock_acquire(
        &self,
        context: &Context,
        cluster_id: &str,
        action_id: &str,
        scope: fleetcore_models::LockScope,
    ) -> anyhow::Result<std::collections::BTreeSet<String>> {
        self.inner.cluster_lock_acquire(context, cluster_id, action_id, scope).await
    }

    pub async fn cluster_lock_release(&self, context: &Context, cluster_id: &str, action_id: &str) -> anyhow::Result<bool> {
        self.inner.cluster_lock_release(context, cluster_id, action_id).await
    }

    pub async fn cluster_lock_steal(&self, context: &Context, cluster_id: &str, new_action_id: &str) -> anyhow::Result<std::collections::BTreeSet<String>> {
        self.inner.cluster_lock_steal(context, cluster_id, new_action_id).await
    }

    pub async fn node_lock_acquire(&self, context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<String> {
        self.inner.node_lock_acquire(context, node_id, action_id).await
    }

    pub async fn node_lock_release(&self, context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<bool> {
        self.inner.node_lock_release(context, node_id, action_id).await
    }

    pub async fn node_lock_steal(&self, context: &Context, node_id: &str, new_action_id: &str) -> anyhow::Result<String> {
        self.inner.node_lock_steal(context, node_id, new_action_id).await
    }

    pub async fn cluster_lock_holders(&self, context: &Context, cluster_id: &str) -> anyhow::Result<std::collections::BTreeSet<String>> {
        self.inner.cluster_lock_holders(context, cluster_id).await
    }

    pub async fn node_lock_holder(&self, context: &Context, node_id: &str) -> anyhow::Result<Option<String>> {
        self.inner.node_lock_holder(context, node_id).await
    }

    /// Atomic `READY -> RUNNING` claim: sets `owner`/`start_time` and
    /// returns the claimed action, or `None` if another worker claimed it
    /// first (or it is no longer ready).
    pub async fn claim_action(&self, context: &Context, action_id: &str, engine_id: &str) -> anyhow::Result<Option<fleetcore_models::Action>> {
        self.inner.claim_action(context, action_id, engine_id).await
    }

    /// Atomic claim of a due [`fleetcore_models::HealthCheck`]: sets
    /// `owner`/`updated_at` iff `is_due` held at call time.
    pub async fn health_claim(&self, context: &Context, id: &str, engine_id: &str) -> anyhow::Result<Option<fleetcore_models::HealthCheck>> {
        self.inner.health_claim(context, id, engine_id).await
    }
}

impl<T: StoreBackend + 'static> From<T> for Store {
    fn from(backend: T) -> Store {
        Store {
            inner: Arc::new(backend),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Store {
    pub fn fixture() -> Self {
        StoreFixture::default().into()
    }
}

/// Arguments to the atomic `node_migrate` transaction.
#[derive(Clone, Debug)]
pub struct NodeMigrate {
    pub node_id: String,
    /// Empty string when the node is leaving a cluster to become an orphan.
    pub from_cluster: String,
    /// Empty string when the node is leaving its current cluster.
    pub to_cluster: String,
    pub role: String,
}

/// Backend implementations receive the wrapping enums, not per-model calls.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn persist(&self, context: &Context, op: PersistOps) -> anyhow::Result<PersistResponses>;
    async fn delete(&self, context: &Context, op: DeleteOps) -> anyhow::Result<DeleteResponses>;
    async fn query(&self, context: &Context, op: QueryOps) -> anyhow::Result<QueryResponses>;

    /// Atomic fetch-and-increment; returns the pre-increment value.
    async fn cluster_next_index(&self, context: &Context, cluster_id: &str) -> anyhow::Result<i64>;

    /// Updates `cluster_id`/`role`, assigns a fresh `index` from
    /// `to_cluster.next_index` when leaving the orphan state, and bumps
    /// `updated_at`, all in one transaction.
    async fn node_migrate(&self, context: &Context, args: NodeMigrate) -> anyhow::Result<()>;

    /// Bulk delete of stored events for one cluster.
    async fn event_prune(&self, context: &Context, cluster_id: &str) -> anyhow::Result<u64>;

    /// Bulk delete of stored events for a project older than `age`.
    async fn event_purge(&self, context: &Context, project: &str, age: time::Duration) -> anyhow::Result<u64>;

    /// Releases any locks held by non-terminal actions owned by `engine_id`
    /// and returns their ids. Status propagation (failing those actions and
    /// cascading to dependents) is the caller's responsibility, via
    /// [`fleetcore_depgraph::DependencyGraph`]. Idempotent.
    async fn gc_by_engine(&self, context: &Context, engine_id: &str) -> anyhow::Result<Vec<String>>;

    /// If compatible with the lock's current scope, inserts `action_id` into
    /// the holder set and returns it; otherwise returns the existing holder
    /// set unchanged (without `action_id`) to signal failure.
    async fn cluster_lock_acquire(
        &self,
        context: &Context,
        cluster_id: &str,
        action_id: &str,
        scope: fleetcore_models::LockScope,
    ) -> anyhow::Result<std::collections::BTreeSet<String>>;

    /// Removes `action_id` from the holder set, deleting the row when it
    /// becomes empty. Returns `true` iff something was removed.
    async fn cluster_lock_release(&self, context: &Context, cluster_id: &str, action_id: &str) -> anyhow::Result<bool>;

    /// Unconditionally replaces the holder set with `{new_action_id}` and
    /// sets scope to exclusive. Used only by admin/forced operations.
    async fn cluster_lock_steal(&self, context: &Context, cluster_id: &str, new_action_id: &str) -> anyhow::Result<std::collections::BTreeSet<String>>;

    /// CAS-style insert; returns the current holder, which equals
    /// `action_id` iff the insert just happened.
    async fn node_lock_acquire(&self, context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<String>;

    /// Deletes the row iff its holder matches `action_id`.
    async fn node_lock_release(&self, context: &Context, node_id: &str, action_id: &str) -> anyhow::Result<bool>;

    async fn node_lock_steal(&self, context: &Context, node_id: &str, new_action_id: &str) -> anyhow::Result<String>;

    /// Read-only lookup used to detect a lost lock at a checkpoint; an empty
    /// set means no lock row exists for this cluster.
    async fn cluster_lock_holders(&self, context: &Context, cluster_id: &str) -> anyhow::Result<std::collections::BTreeSet<String>>;

    /// Read-only lookup of the current node lock holder, if any.
    async fn node_lock_holder(&self, context: &Context, node_id: &str) -> anyhow::Result<Option<String>>;

    /// Atomic `READY -> RUNNING` CAS. Returns `None` if the action is
    /// missing or its status is not `READY` at the time of the call.
    async fn claim_action(&self, context: &Context, action_id: &str, engine_id: &str) -> anyhow::Result<Option<fleetcore_models::Action>>;

    /// Atomic claim of a [`fleetcore_models::HealthCheck`]. Returns `None`
    /// if the row is missing or not currently due.
    async fn health_claim(&self, context: &Context, id: &str, engine_id: &str) -> anyhow::Result<Option<fleetcore_models::HealthCheck>>;
}
