//! The worker pool: claims `READY` actions, drives each through
//! [`fleetcore_oaction::ActionEngine`], and heartbeats its own liveness so
//! dead engines can be swept by any surviving one.
mod backoff;
mod conf;
mod dispatcher;

pub use self::conf::DispatcherBackoff;
pub use self::conf::DispatcherConf;
pub use self::dispatcher::Dispatcher;

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
    use fleetcore_oaction::ActionEngine;
    use fleetcore_policy::PolicyChecker;
    use fleetcore_policy::PolicyRegistry;
    use fleetcore_store::GetAction;
    use fleetcore_store::Store;
    use fleetcore_store::StoreFixture;

    use super::Dispatcher;
    use super::DispatcherConf;

    fn ctx() -> Context {
        Context::fixture()
    }

    #[tokio::test]
    async fn claims_a_ready_action_and_runs_it() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();

        let profile = Profile::new("p1", "profile-1", "os.nova.server", "proj");
        store.persist(&context, profile).await.unwrap();
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", "proj", 0, 10, 1).unwrap();
        store.persist(&context, cluster).await.unwrap();

        let mut action = Action::new("a1", "c1", ActionKind::ClusterCreate, "proj", 60);
        action.status = ActionStatus::Ready;
        store.persist(&context, action).await.unwrap();

        let locks = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let mut drivers = DriverRegistry::build();
        drivers.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
        let policy = PolicyChecker::new(store.clone(), PolicyRegistry::build().finish());
        let events: Events = EventsFixture::new().backend().into();
        let engine = ActionEngine::new(store.clone(), locks.clone(), drivers.finish(), policy, events);

        let conf = DispatcherConf {
            poll_interval: std::time::Duration::from_millis(5),
            periodic_interval: std::time::Duration::from_secs(3600),
            ..Default::default()
        };
        let mut dispatcher = Dispatcher::new(store.clone(), engine, locks, "engine-1", conf);

        let exit = tokio::time::sleep(std::time::Duration::from_millis(200));
        dispatcher.run(&context, exit).await.unwrap();

        let action = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.owner.as_deref(), Some("engine-1"));
        assert_eq!(action.status, ActionStatus::Succeeded);
    }
}
