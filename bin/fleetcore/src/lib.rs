//! Combine individual logical units to initialise and run a `fleetcore` process.
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use fleetcore_conf::Conf;
use fleetcore_context::Context;
use fleetcore_dispatcher::Dispatcher;
use fleetcore_driver::DriverRegistry;
use fleetcore_events::EventsFixture;
use fleetcore_health::HealthRegistry;
use fleetcore_injector::Injector;
use fleetcore_policy::PolicyRegistry;
use fleetcore_store::Store;

mod cli;

pub use self::cli::Cli;

/// Assemble process globals and run the dispatcher and health registry loops
/// until interrupted.
///
/// No persistence or event streaming backend ships with this crate (out of
/// scope — see `DESIGN.md`): the process runs against in-memory fixtures,
/// which is sufficient for exercising the action execution engine but not
/// for durability across restarts.
pub async fn execute(_cli: Cli, conf: Conf) -> Result<()> {
    let logger = fleetcore_conf::configure_logging(&conf.logging);
    let context = Context::root(logger.clone()).admin(true).build();

    let store = Store::fixture();
    let events = EventsFixture::new();
    let drivers = DriverRegistry::build().finish();
    let policy_registry = PolicyRegistry::build().finish();

    let injector = Injector::new(context.clone(), conf.clone(), store, events.backend().into(), drivers, policy_registry)?;
    Injector::set_global(injector.clone());

    let engine_id = fleetcore_models::new_id();
    slog::info!(context.logger, "starting fleetcore engine"; "engine_id" => &engine_id);

    let mut dispatcher = Dispatcher::new(
        injector.store.clone(),
        injector.engine.clone(),
        injector.locks.clone(),
        engine_id.clone(),
        conf.dispatcher.clone(),
    );
    let health = HealthRegistry::new(injector.store.clone(), engine_id, conf.health.clone());

    let grace = Duration::from_secs(conf.runtime.shutdown_grace_sec);
    let (dispatcher_result, health_result) = tokio::join!(
        dispatcher.run(&context, shutdown_signal()),
        health.run(&context, shutdown_signal()),
    );
    slog::info!(context.logger, "fleetcore engine stopping"; "grace_period_secs" => grace.as_secs());
    dispatcher_result?;
    health_result?;
    Ok(())
}

/// Resolves once the process receives an interrupt signal.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Initialise the async runtime for the process and invoke [`execute`].
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let conf = fleetcore_conf::load(&cli.config)?;

    let mut builder = match conf.runtime.worker_threads {
        Some(threads) => {
            let mut builder = tokio::runtime::Builder::new_multi_thread();
            builder.worker_threads(threads);
            builder
        }
        None => tokio::runtime::Builder::new_multi_thread(),
    };
    let runtime = builder.enable_all().build().expect("failed tokio runtime initialisation");
    runtime.block_on(execute(cli, conf))
}
