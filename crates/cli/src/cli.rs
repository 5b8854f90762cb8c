//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{DeviceId, Milliseconds, Precedence};
use std::path::PathBuf;

/// lightsync - leaderless LED pattern synchronization
#[derive(Parser, Debug)]
#[command(
    name = "lightsync",
    author,
    version,
    about = "Leaderless LED pattern synchronization",
    long_about = "Keeps a group of LED devices playing the same pattern on the same timeline.\n\n\
                  Devices broadcast their view of the timeline; every device follows the \n\
                  highest-precedence originator it can hear, directly or through relays."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LIGHTSYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LIGHTSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one device on the configured transports
    Run(RunArgs),

    /// Simulate a mesh of devices in-process
    Simulate(SimulateArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Decode a hex-encoded sync message
    Decode(DecodeArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "lightsync.toml",
        env = "LIGHTSYNC_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the device id from configuration (aa:bb:cc:dd:ee:ff)
    #[arg(long, env = "LIGHTSYNC_DEVICE_ID")]
    pub device_id: Option<DeviceId>,

    /// Override the base precedence from configuration
    #[arg(long, env = "LIGHTSYNC_BASE_PRECEDENCE")]
    pub base_precedence: Option<Precedence>,

    /// Metrics server port, overrides runtime.metrics_port (0 = disabled)
    #[arg(long, env = "LIGHTSYNC_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[arg(long, default_value = "0", env = "LIGHTSYNC_DURATION")]
    pub duration: u64,

    /// Do not read operator commands from stdin
    #[arg(long)]
    pub no_console: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of devices
    #[arg(short = 'n', long, default_value = "5")]
    pub devices: usize,

    /// Number of ticks to run
    #[arg(long, default_value = "3000")]
    pub ticks: u64,

    /// Virtual time per tick in milliseconds
    #[arg(long, default_value = "10")]
    pub tick_ms: Milliseconds,

    /// Which devices can hear each other
    #[arg(long, value_enum, default_value = "full")]
    pub topology: Topology,

    /// Probability that a single delivery is lost (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    pub loss: f64,

    /// Seed for loss and tick ordering
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Output the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "lightsync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "lightsync.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show transport details
    #[arg(long)]
    pub transports: bool,
}

/// Arguments for the `decode` command
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Payload as hex, whitespace and colons allowed
    pub payload: String,

    /// Receiver clock used to turn wire deltas into times
    #[arg(long, default_value = "100000")]
    pub now: Milliseconds,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Simulated mesh shape
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Topology {
    /// Everyone hears everyone
    #[default]
    Full,
    /// Each device hears only its neighbours in a chain
    Line,
    /// A chain closed into a loop
    Ring,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "lightsync",
            "run",
            "--config",
            "device.toml",
            "--device-id",
            "02:00:00:00:00:09",
            "--base-precedence",
            "4000",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("device.toml"));
        assert_eq!(args.device_id, Some(DeviceId::new([2, 0, 0, 0, 0, 9])));
        assert_eq!(args.base_precedence, Some(4000));
    }

    #[test]
    fn test_parse_bad_device_id() {
        let result = Cli::try_parse_from(["lightsync", "run", "--device-id", "nope"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "lightsync", "simulate", "-n", "8", "--topology", "line", "--loss", "0.1",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.devices, 8);
        assert_eq!(args.topology, Topology::Line);
        assert!((args.loss - 0.1).abs() < f64::EPSILON);
    }
}
