//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Radar Fusion - dual mmWave radar track fusion pipeline
#[derive(Parser, Debug)]
#[command(
    name = "radar-fusion",
    author,
    version,
    about = "Dual mmWave radar track fusion pipeline",
    long_about = "Reads target-list frames from several mmWave radars, moves every track into \n\
                  a shared world frame, merges tracks that describe the same object and \n\
                  publishes fused tracks with stable global ids to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RADAR_FUSION_VERBOSE")]
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
        env = "RADAR_FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(default_value = "radar_fusion.toml", env = "RADAR_FUSION_CONFIG")]
    pub config: PathBuf,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "RADAR_FUSION_METRICS_PORT")]
    pub metrics_port: u16,

    /// Stop after this many seconds (0 = run until Ctrl-C)
    #[arg(long, default_value = "0", env = "RADAR_FUSION_DURATION")]
    pub duration: u64,

    /// Override fusion output rate (Hz)
    #[arg(long, env = "RADAR_FUSION_RATE")]
    pub rate: Option<f64>,

    /// Override association distance threshold (m)
    #[arg(long, env = "RADAR_FUSION_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Replace every radar source with the synthetic generator
    #[arg(long)]
    pub synthetic: bool,

    /// How long tasks get to stop before they are aborted (ms)
    #[arg(long, default_value = "2000", env = "RADAR_FUSION_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(default_value = "radar_fusion.toml")]
    pub config: PathBuf,

    /// Print the normalized configuration (all defaults filled in)
    #[arg(long)]
    pub show: bool,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(default_value = "radar_fusion.toml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: InfoFormat,
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

/// `info` output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "radar-fusion",
            "-v",
            "run",
            "cfg.toml",
            "--rate",
            "10",
            "--threshold",
            "0.3",
            "--synthetic",
            "--duration",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("cfg.toml"));
        assert_eq!(args.rate, Some(10.0));
        assert_eq!(args.threshold, Some(0.3));
        assert!(args.synthetic);
        assert_eq!(args.duration, 5);
        assert_eq!(args.shutdown_grace_ms, 2000);
    }

    #[test]
    fn parses_info_format() {
        let cli = Cli::try_parse_from(["radar-fusion", "info", "cfg.toml", "--format", "json"]).unwrap();
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.format, InfoFormat::Json);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["radar-fusion", "-q", "-v", "validate"]).is_err());
    }
}
