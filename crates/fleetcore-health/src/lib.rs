//! The `HealthRegistry`: periodic health-check registrations that
//! *originate* `CLUSTER_CHECK` actions rather than executing checks
//! themselves.
//!
//! Each enabled [`fleetcore_models::HealthCheck`] row names a cluster, a
//! check type and an interval. One engine claims a row per tick (the same
//! `updated_at`-based liveness rule [`fleetcore_models::Service`] uses, via
//! [`fleetcore_store::Store::health_claim`]) and originates a `CLUSTER_CHECK`
//! action with zero dependencies for the Dispatcher to pick up. Reacting to
//! driver-posted lifecycle events (as opposed to this polling mode) is the
//! driver's concern and out of scope here.
mod conf;

pub use self::conf::HealthRegistryConf;

use std::future::Future;

use fleetcore_context::Context;
use fleetcore_errors::EngineError;
use fleetcore_errors::NotFound;
use fleetcore_models::Action;
use fleetcore_models::ActionKind;
use fleetcore_models::ActionStatus;
use fleetcore_models::HealthCheck;
use fleetcore_store::DeleteHealthCheck;
use fleetcore_store::GetCluster;
use fleetcore_store::GetHealthCheck;
use fleetcore_store::ListHealthChecks;
use fleetcore_store::Store;

/// Registers, claims and ticks [`HealthCheck`] rows.
#[derive(Clone)]
pub struct HealthRegistry {
    store: Store,
    engine_id: String,
    conf: HealthRegistryConf,
}

impl HealthRegistry {
    pub fn new(store: Store, engine_id: impl Into<String>, conf: HealthRegistryConf) -> Self {
        HealthRegistry {
            store,
            engine_id: engine_id.into(),
            conf,
        }
    }

    /// Registers a new periodic health check for `cluster_id`.
    pub async fn register(&self, context: &Context, cluster_id: &str, check_type: &str, interval: i64) -> anyhow::Result<HealthCheck> {
        let id = fleetcore_models::new_id();
        let health_check = HealthCheck::new(id, cluster_id, check_type, interval);
        self.store.persist(context, health_check.clone()).await?;
        Ok(health_check)
    }

    /// Updates the `interval`/`disabled` flag of an existing registration.
    pub async fn update(&self, context: &Context, id: &str, interval: Option<i64>, disabled: Option<bool>) -> anyhow::Result<HealthCheck> {
        let mut health_check = self
            .store
            .query(context, GetHealthCheck::from(id))
            .await?
            .ok_or_else(|| EngineError::from(NotFound::new("health_check", id)))?;
        if let Some(interval) = interval {
            health_check.interval = interval;
        }
        if let Some(disabled) = disabled {
            health_check.disabled = disabled;
        }
        self.store.persist(context, health_check.clone()).await?;
        Ok(health_check)
    }

    /// Removes a health check registration.
    pub async fn delete(&self, context: &Context, id: &str) -> anyhow::Result<()> {
        self.store.delete(context, DeleteHealthCheck::from(id)).await?;
        Ok(())
    }

    /// Filters registrations by cluster and/or check type.
    pub async fn get_by_param(&self, context: &Context, cluster_id: Option<&str>, check_type: Option<&str>) -> anyhow::Result<Vec<HealthCheck>> {
        let query = ListHealthChecks {
            cluster_id: cluster_id.map(str::to_string),
            check_type: check_type.map(str::to_string),
        };
        self.store.query(context, query).await
    }

    /// Runs the scan loop until `exit` resolves.
    pub async fn run(&self, context: &Context, exit: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(exit);
        let mut timer = tokio::time::interval(self.conf.scan_interval);
        loop {
            tokio::select! {
                _ = &mut exit => return Ok(()),
                _ = timer.tick() => self.tick(context).await?,
            }
        }
    }

    /// Claims every due registration and originates a `CLUSTER_CHECK` for each.
    async fn tick(&self, context: &Context) -> anyhow::Result<()> {
        let now = time::OffsetDateTime::now_utc();
        let candidates = self.get_by_param(context, None, None).await?;
        for health_check in candidates {
            if !health_check.is_due(now) {
                continue;
            }
            let Some(claimed) = self.store.health_claim(context, &health_check.id, &self.engine_id).await? else {
                continue;
            };
            self.originate(context, &claimed).await?;
        }
        Ok(())
    }

    async fn originate(&self, context: &Context, health_check: &HealthCheck) -> anyhow::Result<()> {
        let cluster = self.store.query(context, GetCluster::from(health_check.cluster_id.as_str())).await?;
        let Some(cluster) = cluster else {
            slog::warn!(
                context.logger,
                "Health check targets a missing cluster, skipping tick";
                "health_check_id" => &health_check.id,
                "cluster_id" => &health_check.cluster_id,
            );
            return Ok(());
        };

        let id = fleetcore_models::new_id();
        let timeout = if cluster.timeout > 0 { cluster.timeout } else { self.conf.default_action_timeout };
        let mut action = Action::new(id, cluster.id.clone(), ActionKind::ClusterCheck, cluster.project.clone(), timeout);
        action.cause = format!("health registry: {}", health_check.check_type);
        action.status = ActionStatus::Ready;
        self.store.persist(context, action).await?;
        slog::info!(
            context.logger,
            "Originated CLUSTER_CHECK from health registry";
            "cluster_id" => &cluster.id,
            "check_type" => &health_check.check_type,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_models::Cluster;
    use fleetcore_store::ListActionsReady;
    use fleetcore_store::Store;
    use fleetcore_store::StoreFixture;

    use super::HealthRegistry;
    use super::HealthRegistryConf;

    fn ctx() -> Context {
        Context::fixture()
    }

    #[tokio::test]
    async fn register_then_tick_originates_cluster_check() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", "proj", 0, -1, 1).unwrap();
        store.persist(&context, cluster).await.unwrap();

        let conf = HealthRegistryConf {
            scan_interval: std::time::Duration::from_millis(5),
            default_action_timeout: 60,
        };
        let registry = HealthRegistry::new(store.clone(), "engine-1", conf);
        let health_check = registry.register(&context, "c1", "polling", 0).await.unwrap();
        assert!(!health_check.disabled);

        registry.tick(&context).await.unwrap();

        let ready = store.query(&context, ListActionsReady).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].target, "c1");
    }

    #[tokio::test]
    async fn tick_skips_when_not_due() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", "proj", 0, -1, 1).unwrap();
        store.persist(&context, cluster).await.unwrap();

        let registry = HealthRegistry::new(store.clone(), "engine-1", HealthRegistryConf::default());
        registry.register(&context, "c1", "polling", 3600).await.unwrap();
        registry.tick(&context).await.unwrap();

        let ready = store.query(&context, ListActionsReady).await.unwrap();
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn get_by_param_filters_by_cluster() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let registry = HealthRegistry::new(store.clone(), "engine-1", HealthRegistryConf::default());
        registry.register(&context, "c1", "polling", 60).await.unwrap();
        registry.register(&context, "c2", "polling", 60).await.unwrap();

        let found = registry.get_by_param(&context, Some("c1"), None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cluster_id, "c1");
    }

    #[tokio::test]
    async fn update_toggles_disabled() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let registry = HealthRegistry::new(store.clone(), "engine-1", HealthRegistryConf::default());
        let health_check = registry.register(&context, "c1", "polling", 60).await.unwrap();

        let updated = registry.update(&context, &health_check.id, None, Some(true)).await.unwrap();
        assert!(updated.disabled);
    }

    #[tokio::test]
    async fn delete_removes_registration() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let registry = HealthRegistry::new(store.clone(), "engine-1", HealthRegistryConf::default());
        let health_check = registry.register(&context, "c1", "polling", 60).await.unwrap();

        registry.delete(&context, &health_check.id).await.unwrap();
        let found = registry.get_by_param(&context, Some("c1"), None).await.unwrap();
        assert!(found.is_empty());
    }
}
