//! `fleetcore` process configuration object and helpers.
mod events;
mod loading;
mod logging;
mod object;
mod runtime;

pub use self::events::EventsConf;
pub use self::loading::load;
pub use self::loading::Error;
pub use self::logging::configure as configure_logging;
pub use self::logging::LogLevel;
pub use self::logging::LoggingConf;
pub use self::object::Conf;
pub use self::runtime::RuntimeConf;
