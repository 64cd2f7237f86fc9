//! The action engine: locks, policy hooks, driver dispatch and dependency
//! propagation for every [`fleetcore_models::ActionKind`].
//!
//! [`ActionEngine::execute`] is the single entry point the dispatcher calls
//! once per tick of a claimed action. Everything else in this crate is
//! either the outer skeleton (`engine.rs`) or a per-kind body
//! (`cluster.rs`, `node.rs`).
mod cluster;
mod engine;
mod node;
mod outcome;
mod support;

pub use self::engine::ActionEngine;
pub use self::outcome::Outcome;

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_driver::DriverFixture;
    use fleetcore_driver::DriverMetadata;
    use fleetcore_driver::DriverRegistry;
    use fleetcore_events::Events;
    use fleetcore_events::EventsFixture;
    use fleetcore_locks::LocksConf;
    use fleetcore_locks::LockManager;
    use fleetcore_models::Action;
    use fleetcore_models::ActionKind;
    use fleetcore_models::ActionStatus;
    use fleetcore_models::Cluster;
    use fleetcore_models::ClusterStatus;
    use fleetcore_models::Node;
    use fleetcore_models::Profile;
    use fleetcore_policy::PolicyChecker;
    use fleetcore_policy::PolicyRegistry;
    use fleetcore_store::GetAction;
    use fleetcore_store::GetCluster;
    use fleetcore_store::GetNode;
    use fleetcore_store::Store;
    use fleetcore_store::StoreFixture;

    use super::ActionEngine;

    fn ctx() -> Context {
        Context::fixture()
    }

    fn engine(store: Store, driver: DriverFixture) -> ActionEngine {
        let locks = LockManager::new(store.clone(), LocksConf { retry_times: 1, retry_interval: std::time::Duration::from_millis(1) });
        let mut drivers = DriverRegistry::build();
        drivers.register(DriverMetadata::build("os.nova.server", driver).finish());
        let policy = PolicyChecker::new(store.clone(), PolicyRegistry::build().finish());
        let events: Events = EventsFixture::new().backend().into();
        ActionEngine::new(store, locks, drivers.finish(), policy, events)
    }

    async fn seed_cluster(store: &Store, context: &Context, desired: i64) -> Cluster {
        let profile = Profile::new("p1", "profile-1", "os.nova.server", "proj");
        store.persist(context, profile).await.unwrap();
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", "proj", 0, 10, desired).unwrap();
        store.persist(context, cluster.clone()).await.unwrap();
        cluster
    }

    #[tokio::test]
    async fn cluster_create_spawns_nodes_then_reaps_to_active() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        seed_cluster(&store, &context, 3).await;
        let engine = engine(store.clone(), DriverFixture::new());

        let mut action = Action::new("a1", "c1", ActionKind::ClusterCreate, "proj", 60);
        action.status = ActionStatus::Running;
        store.persist(&context, action).await.unwrap();

        engine.execute(&context, "a1", "engine-1").await.unwrap();
        let cluster = store.query(&context, GetCluster::from("c1")).await.unwrap().unwrap();
        assert_eq!(cluster.status, ClusterStatus::Creating);

        let action = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Waiting);
        let children: Vec<String> = action.data.get("children").unwrap().as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        assert_eq!(children.len(), 3);

        for child_id in &children {
            engine.execute(&context, child_id, "engine-1").await.unwrap();
        }

        let action = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Ready);
        engine.execute(&context, "a1", "engine-1").await.unwrap();

        let action = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Succeeded);
        let cluster = store.query(&context, GetCluster::from("c1")).await.unwrap().unwrap();
        assert_eq!(cluster.status, ClusterStatus::Active);

        let mut indices: Vec<i64> = Vec::new();
        for child_id in &children {
            let child = store.query(&context, GetAction::from(child_id.as_str())).await.unwrap().unwrap();
            assert_eq!(child.status, ActionStatus::Succeeded);
            let node = store.query(&context, GetNode::from(child.target.as_str())).await.unwrap().unwrap();
            indices.push(node.index);
        }
        indices.sort();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn node_create_failure_fails_the_action_and_releases_the_lock() {
        let store: Store = StoreFixture::default().into();
        let context = ctx();
        let profile = Profile::new("p1", "profile-1", "os.nova.server", "proj");
        store.persist(&context, profile).await.unwrap();
        let mut node = Node::orphan("n1", "node-1", "p1");
        node.cluster_id = "c1".to_string();
        store.persist(&context, node).await.unwrap();

        let driver = DriverFixture::new();
        driver.fail_create();
        let engine = engine(store.clone(), driver);

        let mut action = Action::new("a1", "n1", ActionKind::NodeCreate, "proj", 60);
        action.status = ActionStatus::Running;
        store.persist(&context, action).await.unwrap();

        engine.execute(&context, "a1", "engine-1").await.unwrap();
        let action = store.query(&context, GetAction::from("a1")).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Failed);

        let node = store.query(&context, GetNode::from("n1")).await.unwrap().unwrap();
        assert_eq!(node.status, fleetcore_models::NodeStatus::Error);
    }
}
