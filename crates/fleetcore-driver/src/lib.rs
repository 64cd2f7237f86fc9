//! Resource driver capability: the boundary through which the engine
//! realizes lifecycle operations against actual infrastructure.
//!
//! Concrete drivers are plugins outside this crate's scope; this crate only
//! defines the [`ResourceDriver`] interface and the [`DriverRegistry`] that
//! resolves a profile's `type` to the driver that handles it.
mod handler;
pub mod errors;
mod registry;

pub use self::handler::NodeHealth;
pub use self::handler::RecoverOperation;
pub use self::handler::ResourceDriver;
pub use self::registry::DriverMetadata;
pub use self::registry::DriverMetadataBuilder;
pub use self::registry::DriverRegistry;
pub use self::registry::DriverRegistryBuilder;
pub use self::registry::DEFAULT_TIMEOUT;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::DriverFixture;

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_context::Context;
    use fleetcore_models::Node;

    #[tokio::test]
    async fn registry_resolves_by_profile_type_and_version() {
        let fixture = DriverFixture::new();
        let mut builder = DriverRegistry::build();
        builder.register(DriverMetadata::build("os.nova.server", fixture).finish());
        let registry = builder.finish();

        let metadata = registry.lookup("os.nova.server", "v1").unwrap();
        let context = Context::fixture();
        let node = Node::orphan("n1", "node-1", "p1");
        let physical_id = metadata.driver.create(&context, &node).await.unwrap();
        assert_eq!(physical_id, "physical-n1");
    }

    #[test]
    fn unknown_profile_type_is_not_found() {
        let registry = DriverRegistry::build().finish();
        let error = registry.lookup("bogus", "v1").unwrap_err();
        assert!(error.downcast_ref::<errors::DriverNotFound>().is_some());
    }

    /// Same `profile_type`, two versions: both resolve independently, no
    /// panic on registration.
    #[test]
    fn two_versions_of_the_same_profile_type_coexist() {
        let mut builder = DriverRegistry::build();
        builder.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
        builder.register({
            let mut metadata = DriverMetadata::build("os.nova.server", DriverFixture::new());
            metadata.version("v2");
            metadata.finish()
        });
        let registry = builder.finish();

        assert!(registry.lookup("os.nova.server", "v1").is_ok());
        assert!(registry.lookup("os.nova.server", "v2").is_ok());
        assert!(registry.lookup("os.nova.server", "v3").is_err());
    }

    #[test]
    #[should_panic(expected = "cannot be registered more than once")]
    fn duplicate_registration_panics() {
        let mut builder = DriverRegistry::build();
        builder.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
        builder.register(DriverMetadata::build("os.nova.server", DriverFixture::new()).finish());
    }
}
