use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::ResourceDriver;

/// Default timeout a node operation is allowed to run for before the engine
/// gives up waiting on the driver.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Version assumed by [`DriverMetadata::build`] when the caller doesn't pick
/// one explicitly.
pub const DEFAULT_VERSION: &str = "v1";

/// Metadata attached to a registered resource driver.
pub struct DriverMetadata {
    /// Profile `type` this driver handles.
    pub profile_type: String,
    /// Driver implementation version; together with `profile_type` this is
    /// the registry key, so two versions of the same profile type can be
    /// registered side by side during a rollout.
    pub version: String,
    pub timeout: Duration,
    pub driver: Box<dyn ResourceDriver>,
}

impl DriverMetadata {
    pub fn build<T, D>(profile_type: T, driver: D) -> DriverMetadataBuilder
    where
        T: Into<String>,
        D: ResourceDriver + 'static,
    {
        DriverMetadataBuilder {
            profile_type: profile_type.into(),
            version: DEFAULT_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            driver: Box::new(driver),
        }
    }
}

/// Incrementally build a [`DriverMetadata`].
pub struct DriverMetadataBuilder {
    profile_type: String,
    version: String,
    timeout: Duration,
    driver: Box<dyn ResourceDriver>,
}

impl DriverMetadataBuilder {
    pub fn finish(self) -> DriverMetadata {
        DriverMetadata {
            profile_type: self.profile_type,
            version: self.version,
            timeout: self.timeout,
            driver: self.driver,
        }
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = version.into();
        self
    }
}

/// Key a [`DriverRegistry`] resolves on: a profile `type` plus the driver
/// version a profile selects via [`fleetcore_models::Profile::version`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DriverKey {
    profile_type: String,
    version: String,
}

/// Resolves a profile's `(type, version)` to the [`ResourceDriver`] that
/// handles it.
#[derive(Clone)]
pub struct DriverRegistry {
    entries: Arc<HashMap<DriverKey, DriverMetadata>>,
}

impl DriverRegistry {
    pub fn build() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    pub fn lookup(&self, profile_type: &str, version: &str) -> Result<&DriverMetadata> {
        let key = DriverKey { profile_type: profile_type.to_string(), version: version.to_string() };
        self.entries
            .get(&key)
            .ok_or_else(|| crate::errors::DriverNotFound::from(format!("{profile_type}@{version}").as_str()))
            .map_err(anyhow::Error::from)
    }
}

/// Incrementally build a [`DriverRegistry`].
#[derive(Default)]
pub struct DriverRegistryBuilder {
    entries: HashMap<DriverKey, DriverMetadata>,
}

impl DriverRegistryBuilder {
    pub fn finish(self) -> DriverRegistry {
        DriverRegistry {
            entries: Arc::new(self.entries),
        }
    }

    /// # Panics
    ///
    /// Panics if `(profile_type, version)` is already registered.
    pub fn register(&mut self, metadata: DriverMetadata) -> &mut Self {
        let key = DriverKey { profile_type: metadata.profile_type.clone(), version: metadata.version.clone() };
        if self.entries.contains_key(&key) {
            panic!("resource driver for profile type {}@{} cannot be registered more than once", metadata.profile_type, metadata.version);
        }
        self.entries.insert(key, metadata);
        self
    }
}
