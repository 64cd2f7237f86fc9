//! The worker pool dispatch loop.
use std::any::Any;
use std::future::Future;

use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_depgraph::DependencyGraph;
use fleetcore_locks::LockManager;
use fleetcore_models::Service;
use fleetcore_oaction::ActionEngine;
use fleetcore_store::ListActionsReady;
use fleetcore_store::ListServices;
use fleetcore_store::Store;
use futures::stream::FuturesUnordered;
use futures::stream::StreamExt;

use crate::backoff::Backoff;
use crate::conf::DispatcherConf;

/// Claims `READY` actions, hands each to an [`ActionEngine`] on its own
/// worker task, and periodically heartbeats the owning [`Service`] row so
/// other engines can detect this one going dead.
///
/// ## Shutdown
///
/// The `exit` future passed to [`Dispatcher::run`] is raced against the main
/// loop. When it resolves the dispatcher stops claiming new actions and
/// aborts whatever is still in flight — those actions stay `RUNNING` and are
/// picked up by [`LockManager::sweep_dead_engine`] once this engine's
/// heartbeat lapses.
pub struct Dispatcher {
    store: Store,
    engine: ActionEngine,
    locks: LockManager,
    depgraph: DependencyGraph,
    engine_id: String,
    conf: DispatcherConf,
    pool: FuturesUnordered<tokio::task::JoinHandle<Result<()>>>,
}

impl Dispatcher {
    pub fn new(store: Store, engine: ActionEngine, locks: LockManager, engine_id: impl Into<String>, conf: DispatcherConf) -> Self {
        Dispatcher {
            depgraph: DependencyGraph::new(store.clone()),
            store,
            engine,
            locks,
            engine_id: engine_id.into(),
            conf,
            pool: FuturesUnordered::new(),
        }
    }

    /// Runs the dispatch loop until `exit` resolves or an unrecoverable
    /// Store error exhausts its retry budget.
    pub async fn run(&mut self, context: &Context, exit: impl Future<Output = ()>) -> Result<()> {
        let mut propagate_panic = None;
        let result = self.run_inner(context, exit, &mut propagate_panic).await;

        for task in self.pool.iter() {
            task.abort();
        }
        self.pool.clear();

        if let Some(payload) = propagate_panic {
            slog::error!(context.logger, "Propagating panic from action execution");
            std::panic::resume_unwind(payload);
        }
        result
    }

    async fn run_inner(&mut self, context: &Context, exit: impl Future<Output = ()>, propagate_panic: &mut Option<Box<dyn Any + Send + 'static>>) -> Result<()> {
        tokio::pin!(exit);
        let mut poll_timer = tokio::time::interval(self.conf.poll_interval);
        let mut heartbeat_timer = tokio::time::interval(self.conf.periodic_interval);
        let mut poll_backoff = Backoff::new(&self.conf.backoff);

        self.heartbeat(context).await?;

        loop {
            tokio::select! {
                _ = &mut exit => break,

                _ = heartbeat_timer.tick() => {
                    self.heartbeat(context).await?;
                    self.sweep_dead_engines(context).await?;
                }

                _ = poll_timer.tick(), if self.pool.len() < self.conf.concurrent_actions => {
                    match self.claim_and_spawn(context).await {
                        Ok(()) => poll_backoff.success(),
                        Err(error) => poll_backoff.retry(context, error).await?,
                    }
                }

                result = self.pool.next(), if !self.pool.is_empty() => {
                    let Some(result) = result else { continue };
                    match result {
                        Err(error) if error.is_panic() => {
                            *propagate_panic = Some(error.into_panic());
                            break;
                        }
                        Err(error) if error.is_cancelled() => {
                            slog::debug!(context.logger, "Ignoring cancelled action execution task");
                        }
                        Err(error) => {
                            slog::warn!(context.logger, "Unknown error from action execution task"; "error" => error.to_string());
                        }
                        Ok(Err(error)) => {
                            slog::warn!(context.logger, "Action execution returned an error"; "error" => error.to_string());
                        }
                        Ok(Ok(())) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Lists `READY` actions, claims as many as there is spare pool
    /// capacity for, and spawns each on its own task.
    async fn claim_and_spawn(&mut self, context: &Context) -> Result<()> {
        let candidates = self.store.query(context, ListActionsReady).await?;
        let capacity = self.conf.concurrent_actions.saturating_sub(self.pool.len());
        for action in candidates.into_iter().take(capacity) {
            let Some(claimed) = self.store.claim_action(context, &action.id, &self.engine_id).await? else {
                continue;
            };
            let engine = self.engine.clone();
            let context = context.clone();
            let engine_id = self.engine_id.clone();
            let join = tokio::spawn(async move { engine.execute(&context, &claimed.id, &engine_id).await });
            self.pool.push(join);
        }
        Ok(())
    }

    async fn heartbeat(&self, context: &Context) -> Result<()> {
        let service = Service::new(self.engine_id.clone(), hostname(), "fleetcore", "actions");
        self.store.persist(context, service).await?;
        Ok(())
    }

    /// Finds services that have missed two consecutive heartbeats and
    /// sweeps the locks/actions owned by each, cascading failure to every
    /// transitive dependent through the dependency graph.
    async fn sweep_dead_engines(&self, context: &Context) -> Result<()> {
        let interval = time::Duration::seconds(self.conf.periodic_interval.as_secs() as i64);
        let now = time::OffsetDateTime::now_utc();
        let services = self.store.query(context, ListServices).await?;
        for service in services {
            if service.id == self.engine_id || !service.is_dead(now, interval) {
                continue;
            }
            let failed_ids = self.locks.sweep_dead_engine(context, &service.id).await?;
            for action_id in &failed_ids {
                self.depgraph.mark_failed(context, action_id, "Engine failure", now).await?;
            }
            if !failed_ids.is_empty() {
                slog::info!(context.logger, "Swept dead engine"; "engine_id" => &service.id, "actions_failed" => failed_ids.len());
            }
        }
        Ok(())
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_depgraph::Dependents;
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
    use fleetcore_models::Service;
    use fleetcore_policy::PolicyChecker;
    use fleetcore_policy::PolicyRegistry;
    use fleetcore_store::GetAction;
    use fleetcore_store::Store;
    use fleetcore_store::StoreFixture;

    use super::DependencyGraph;
    use super::Dispatcher;
    use crate::conf::DispatcherConf;

    fn ctx() -> Context {
        Context::fixture()
    }

    fn engine(store: Store) -> fleetcore_oaction::ActionEngine {
        let locks = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let mut drivers = DriverRegistry::build();
        drivers.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
        let policy = PolicyChecker::new(store.clone(), PolicyRegistry::build().finish());
        let events: Events = EventsFixture::new().backend().into();
        fleetcore_oaction::ActionEngine::new(store, locks, drivers.finish(), policy, events)
    }

    /// A parent action owned by a dead engine cascades failure to a child
    /// that only depends on it, even though the child was never owned by
    /// that engine.
    #[tokio::test]
    async fn sweep_dead_engines_cascades_to_dependents() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();

        let mut dead_service = Service::new("dead-engine", "host", "fleetcore", "actions");
        dead_service.updated_at = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
        store.persist(&context, dead_service).await.unwrap();

        let mut parent = Action::new("parent", "c1", ActionKind::ClusterCheck, "proj", 60);
        parent.owner = Some("dead-engine".to_string());
        parent.status = ActionStatus::Running;
        store.persist(&context, parent).await.unwrap();

        let mut child = Action::new("child", "c1", ActionKind::NodeCheck, "proj", 60);
        child.status = ActionStatus::Waiting;
        store.persist(&context, child).await.unwrap();

        let graph = DependencyGraph::new(store.clone());
        let parents = vec!["parent".to_string()];
        graph
            .add_dependency(&context, Dependents::ManyParentsOneChild { parents: &parents, child: "child" }, time::OffsetDateTime::now_utc())
            .await
            .unwrap();

        let locks = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let conf = DispatcherConf { periodic_interval: std::time::Duration::from_secs(10), ..Default::default() };
        let dispatcher = Dispatcher::new(store.clone(), engine(store.clone()), locks, "engine-1", conf);

        dispatcher.sweep_dead_engines(&context).await.unwrap();

        let parent = store.query(&context, GetAction::from("parent")).await.unwrap().unwrap();
        let child = store.query(&context, GetAction::from("child")).await.unwrap().unwrap();
        assert_eq!(parent.status, ActionStatus::Failed);
        assert_eq!(child.status, ActionStatus::Failed);
    }
}
