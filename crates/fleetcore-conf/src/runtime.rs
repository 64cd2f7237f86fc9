use serde::Deserialize;
use serde::Serialize;

/// Container for the process' async runtime sizing and shutdown behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConf {
    /// Number of tokio worker threads; `None` defers to tokio's own default
    /// (the number of available cores).
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Allowed time, in seconds, for in-flight actions to unwind once
    /// process shutdown begins.
    #[serde(default = "RuntimeConf::default_shutdown_grace")]
    pub shutdown_grace_sec: u64,
}

impl RuntimeConf {
    fn default_shutdown_grace() -> u64 {
        30
    }
}

impl Default for RuntimeConf {
    fn default() -> Self {
        RuntimeConf {
            worker_threads: None,
            shutdown_grace_sec: Self::default_shutdown_grace(),
        }
    }
}
