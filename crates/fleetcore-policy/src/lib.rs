//! Policy capability interface, registry and the pre/post-op checker.
//!
//! Concrete policy types (scaling, affinity, deletion order, ...) are
//! plugins outside this crate's scope; this crate defines the
//! [`PolicyHandler`] interface, the [`PolicyRegistry`] that resolves a
//! policy's `type` to its handler, and the [`PolicyChecker`] that runs a
//! cluster's enabled bindings against an action.
mod checker;
pub mod errors;
mod handler;
mod registry;

pub use self::checker::PolicyChecker;
pub use self::handler::OpPhase;
pub use self::handler::PolicyHandler;
pub use self::registry::PolicyMetadata;
pub use self::registry::PolicyMetadataBuilder;
pub use self::registry::PolicyRegistry;
pub use self::registry::PolicyRegistryBuilder;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::PolicyFixture;

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_context::Context;
    use fleetcore_models::Action;
    use fleetcore_models::ActionKind;
    use fleetcore_models::ActionStatus;
    use fleetcore_models::Cluster;
    use fleetcore_models::ClusterPolicyBinding;
    use fleetcore_models::Policy;
    use fleetcore_store::Store;

    fn registry(fixture: PolicyFixture) -> PolicyRegistry {
        let mut builder = PolicyRegistry::build();
        builder.register(
            PolicyMetadata::build("fleetcore.policy.scaling", fixture)
                .on(OpPhase::Before, ActionKind::ClusterResize)
                .on(OpPhase::After, ActionKind::ClusterResize)
                .finish(),
        );
        builder.finish()
    }

    async fn seed(store: &Store, context: &Context) {
        let cluster = Cluster::new("c1", "cluster-1", "p1", "u1", "default", 1, 10, 3).unwrap();
        store.persist(context, cluster).await.unwrap();
        let policy = Policy::new("pol1", "scaling", "fleetcore.policy.scaling", "default");
        store.persist(context, policy).await.unwrap();
        let binding = ClusterPolicyBinding::new("c1", "pol1", 10);
        store.persist(context, binding).await.unwrap();
    }

    #[tokio::test]
    async fn pre_op_runs_matching_binding_and_persists_data() {
        let store = Store::fixture();
        let context = Context::fixture();
        seed(&store, &context).await;

        let fixture = PolicyFixture::new();
        let checker = PolicyChecker::new(store.clone(), registry(fixture));

        let mut action = Action::new("a1", "c1", ActionKind::ClusterResize, "default", 60);
        checker.pre_op(&context, "c1", &mut action).await.unwrap();

        assert_eq!(action.status, ActionStatus::Init);
        let binding = store
            .query(&context, fleetcore_store::GetClusterPolicyBinding { cluster_id: "c1".to_string(), policy_id: "pol1".to_string() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding.data.get("pre_op"), Some(&serde_json::Value::Bool(true)));
    }

    #[tokio::test]
    async fn pre_op_ignores_unrelated_action_kind() {
        let store = Store::fixture();
        let context = Context::fixture();
        seed(&store, &context).await;

        let fixture = PolicyFixture::new();
        let checker = PolicyChecker::new(store.clone(), registry(fixture));

        let mut action = Action::new("a1", "c1", ActionKind::ClusterCheck, "default", 60);
        checker.pre_op(&context, "c1", &mut action).await.unwrap();

        let binding = store
            .query(&context, fleetcore_store::GetClusterPolicyBinding { cluster_id: "c1".to_string(), policy_id: "pol1".to_string() })
            .await
            .unwrap()
            .unwrap();
        assert!(binding.data.is_empty());
    }

    #[tokio::test]
    async fn veto_stops_further_bindings() {
        let store = Store::fixture();
        let context = Context::fixture();
        seed(&store, &context).await;

        let policy2 = Policy::new("pol2", "affinity", "fleetcore.policy.scaling", "default");
        store.persist(&context, policy2).await.unwrap();
        let binding2 = ClusterPolicyBinding::new("c1", "pol2", 20);
        store.persist(&context, binding2).await.unwrap();

        let vetoing = PolicyFixture::new();
        vetoing.veto("scaling window closed");
        let mut builder = PolicyRegistry::build();
        builder.register(
            PolicyMetadata::build("fleetcore.policy.scaling", vetoing)
                .on(OpPhase::Before, ActionKind::ClusterResize)
                .finish(),
        );
        let checker = PolicyChecker::new(store.clone(), builder.finish());

        let mut action = Action::new("a1", "c1", ActionKind::ClusterResize, "default", 60);
        checker.pre_op(&context, "c1", &mut action).await.unwrap();

        assert_eq!(action.data.get("status").and_then(|v| v.as_str()), Some("ERROR"));
        assert_eq!(action.data.get("reason").and_then(|v| v.as_str()), Some("scaling window closed"));

        let binding1 = store
            .query(&context, fleetcore_store::GetClusterPolicyBinding { cluster_id: "c1".to_string(), policy_id: "pol1".to_string() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding1.data.get("pre_op"), Some(&serde_json::Value::Bool(true)));
        let binding2 = store
            .query(&context, fleetcore_store::GetClusterPolicyBinding { cluster_id: "c1".to_string(), policy_id: "pol2".to_string() })
            .await
            .unwrap()
            .unwrap();
        assert!(binding2.data.is_empty());
    }

    #[test]
    fn unknown_policy_type_is_not_found() {
        let registry = PolicyRegistry::build().finish();
        let error = registry.lookup("bogus", "v1").unwrap_err();
        assert!(error.downcast_ref::<errors::PolicyNotFound>().is_some());
    }

    /// Same `policy_type`, two versions: both resolve independently, no
    /// panic on registration.
    #[test]
    fn two_versions_of_the_same_policy_type_coexist() {
        let mut builder = PolicyRegistry::build();
        builder.register(PolicyMetadata::build("fleetcore.policy.scaling", PolicyFixture::new()).finish());
        builder.register({
            let mut metadata = PolicyMetadata::build("fleetcore.policy.scaling", PolicyFixture::new());
            metadata.version("v2");
            metadata.finish()
        });
        let registry = builder.finish();

        assert!(registry.lookup("fleetcore.policy.scaling", "v1").is_ok());
        assert!(registry.lookup("fleetcore.policy.scaling", "v2").is_ok());
        assert!(registry.lookup("fleetcore.policy.scaling", "v3").is_err());
    }
}
