//! Command line surface for the `fleetcore` binary.
use clap::Parser;

/// `fleetcore` action execution engine process.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Path to the `fleetcore` configuration file to load.
    #[arg(short = 'c', long = "config", default_value_t = String::from("fleetcore.yaml"))]
    pub config: String,
}
