//! Dependency injection to enable easy access to process global resources.
use std::sync::RwLock;

use once_cell::sync::Lazy;

use fleetcore_conf::Conf;
use fleetcore_context::Context;
use fleetcore_credentials::CredentialVault;
use fleetcore_driver::DriverRegistry;
use fleetcore_events::Events;
use fleetcore_locks::LockManager;
use fleetcore_oaction::ActionEngine;
use fleetcore_policy::PolicyChecker;
use fleetcore_policy::PolicyRegistry;
use fleetcore_store::Store;

/// Singleton instance of the process globals container.
static GLOBAL_INJECTOR: Lazy<RwLock<Option<Injector>>> = Lazy::new(|| RwLock::new(None));

/// Container for all process global dependencies shared between the
/// components that run an engine process.
///
/// This holds capabilities, not run loops: the [`fleetcore_dispatcher::Dispatcher`]
/// and [`fleetcore_health::HealthRegistry`] are built from `engine`/`store`/
/// `locks` for the lifetime of a single `run`, not stored here, since each
/// owns in-flight task state that must not be shared or cloned.
///
/// Profile/policy implementations are not built here either: only the
/// [`DriverRegistry`]/[`PolicyRegistry`] capability surfaces are, and callers
/// populate them before handing the finished [`Injector`] to
/// [`Injector::set_global`].
#[derive(Clone)]
pub struct Injector {
    /// Process global context to derive request-scoped contexts from.
    pub context: Context,

    /// Process global configuration.
    pub conf: Conf,

    /// Interface to persist state.
    pub store: Store,

    /// Interface to emit system events.
    pub events: Events,

    /// Resolves profile types to their resource driver.
    pub drivers: DriverRegistry,

    /// Runs policy checks around action execution.
    pub policy: PolicyChecker,

    /// Acquires and releases cluster/node locks.
    pub locks: LockManager,

    /// Encrypts and decrypts stored credentials.
    pub credentials: CredentialVault,

    /// Executes individual actions end to end.
    pub engine: ActionEngine,
}

impl Injector {
    /// Assemble an [`Injector`] from its configuration and process context.
    ///
    /// `store`/`events`/`drivers`/`policy_registry` are backends chosen by
    /// the caller since this crate ships no concrete implementation of any
    /// of them.
    pub fn new(
        context: Context,
        conf: Conf,
        store: Store,
        events: Events,
        drivers: DriverRegistry,
        policy_registry: PolicyRegistry,
    ) -> anyhow::Result<Self> {
        let credentials = CredentialVault::new(store.clone(), &conf.credentials)?;
        let locks = LockManager::new(store.clone(), conf.locks.clone());
        let policy = PolicyChecker::new(store.clone(), policy_registry);
        let engine = ActionEngine::new(store.clone(), locks.clone(), drivers.clone(), policy.clone(), events.clone());
        Ok(Injector {
            context,
            conf,
            store,
            events,
            drivers,
            policy,
            locks,
            credentials,
            engine,
        })
    }

    /// Get the globally set [`Injector`] instance.
    ///
    /// # Panics
    ///
    /// Panics if no [`Injector`] was set during process initialisation.
    pub fn global() -> Injector {
        GLOBAL_INJECTOR
            .read()
            .expect("GLOBAL_INJECTOR RwLock poisoned")
            .as_ref()
            .expect("global injector is not initialised")
            .clone()
    }

    /// Set the [`Injector`] instance for the process to fetch with [`Injector::global`].
    ///
    /// # Panics
    ///
    /// Panics if an [`Injector`] has already been set.
    pub fn set_global(injector: Injector) {
        let mut global_injector = GLOBAL_INJECTOR.write().expect("GLOBAL_INJECTOR RwLock poisoned");
        if global_injector.is_some() {
            drop(global_injector);
            panic!("global injector already initialised");
        }
        slog::trace!(injector.context.logger, "initialising global injector for the process");
        *global_injector = Some(injector);
    }
}

#[cfg(any(test, feature = "test-fixture"))]
pub struct InjectorFixture {
    pub injector: Injector,
    pub events: fleetcore_events::EventsFixture,
}

#[cfg(any(test, feature = "test-fixture"))]
impl Injector {
    /// [`Injector`] instance to be used with unit tests.
    pub fn fixture() -> InjectorFixture {
        let events = fleetcore_events::EventsFixture::new();
        let store = Store::fixture();
        let context = Context::fixture();
        let conf = Conf::default();
        let drivers = DriverRegistry::build().finish();
        let policy_registry = PolicyRegistry::build().finish();
        let injector = Injector::new(context, conf, store, events.backend().into(), drivers, policy_registry)
            .expect("fixture CredentialsConf must be valid");
        InjectorFixture { injector, events }
    }
}

#[cfg(test)]
mod tests {
    use super::Injector;

    #[test]
    fn fixture_wires_every_capability() {
        let fixture = Injector::fixture();
        assert_eq!(fixture.injector.conf.credentials.cipher_init_vector.len(), 16);
    }

    #[test]
    #[should_panic(expected = "global injector is not initialised")]
    fn global_panics_when_unset() {
        Injector::global();
    }
}
