use serde::Deserialize;
use serde::Serialize;
use slog::Drain;
use slog::Logger;

/// Verbosity levels a deployment can configure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for slog::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => slog::Level::Critical,
            LogLevel::Error => slog::Level::Error,
            LogLevel::Warning => slog::Level::Warning,
            LogLevel::Info => slog::Level::Info,
            LogLevel::Debug => slog::Level::Debug,
        }
    }
}

/// Logging configuration for the process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConf {
    /// Minimum level emitted by the root logger.
    #[serde(default)]
    pub level: LogLevel,

    /// Route log records through a background thread instead of the
    /// calling one.
    #[serde(default = "LoggingConf::default_async")]
    pub r#async: bool,
}

impl LoggingConf {
    fn default_async() -> bool {
        true
    }
}

impl Default for LoggingConf {
    fn default() -> Self {
        LoggingConf {
            level: LogLevel::default(),
            r#async: Self::default_async(),
        }
    }
}

/// A [`Drain`] wrapper with `Ok = ()`, unlike [`slog::LevelFilter`] whose
/// `Ok` is wrapped in an `Option`, which cannot be rooted into a [`Logger`].
struct LevelFilter<D: Drain>(D, slog::Level);

impl<D: Drain> Drain for LevelFilter<D> {
    type Ok = ();
    type Err = D::Err;

    fn log(&self, record: &slog::Record, values: &slog::OwnedKVList) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.1) {
            self.0.log(record, values)?;
        }
        Ok(())
    }
}

/// Builds the process-root [`Logger`] from [`LoggingConf`].
///
/// Emits to stdout via `slog-term`; there is no file/journald drain in this
/// crate (out of scope — see the spec's note that log exporters are an
/// external concern).
pub fn configure(conf: &LoggingConf) -> Logger {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = LevelFilter(drain, conf.level.into());
    if conf.r#async {
        let drain = slog_async::Async::new(drain.fuse()).build().fuse();
        Logger::root(drain, slog::o!("service" => "fleetcore"))
    } else {
        Logger::root(drain.fuse(), slog::o!("service" => "fleetcore"))
    }
}
