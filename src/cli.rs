use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ecg-link",
    version,
    about = "Connect to a three-lead ECG device and record its leads",
    long_about = "Connect to a three-lead ECG device over WebSocket (ws://<ip>/ws),\n\
                  stream its samples and record each lead for a fixed duration.\n\
                  The last device address used is remembered between runs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON config file overriding link defaults
    #[arg(long, global = true, env = "ECG_LINK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that a device address is a valid IPv4 address
    Validate(ValidateArgs),
    /// Connect and print live status until interrupted
    Monitor(MonitorArgs),
    /// Record one or more leads and optionally request an analysis
    Record(RecordArgs),
    /// Show what the analysis service reports about its model
    ModelInfo(ModelInfoArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Device address, e.g. 192.168.1.50
    pub address: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct MonitorArgs {
    /// Device address (defaults to the last address used)
    #[arg(long)]
    pub address: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Lead to preview
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub lead: u8,
}

#[derive(Args)]
pub struct RecordArgs {
    /// Device address (defaults to the last address used)
    #[arg(long)]
    pub address: Option<String>,

    /// Leads to record, in order
    #[arg(
        long,
        num_args = 1..,
        default_values_t = vec![1u8, 2, 3],
        value_parser = clap::value_parser!(u8).range(1..=3)
    )]
    pub leads: Vec<u8>,

    /// Recording duration per lead in seconds (config default: 15)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Write the recording as JSON to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Compact JSON output
    #[arg(long)]
    pub compact: bool,

    /// Send the recording to the analysis service
    #[arg(long)]
    pub analyze: bool,

    /// Analysis service base URL
    #[arg(long, env = "ECG_ANALYSIS_URL")]
    pub analysis_url: Option<String>,
}

#[derive(Args)]
pub struct ModelInfoArgs {
    /// Analysis service base URL
    #[arg(long, env = "ECG_ANALYSIS_URL")]
    pub analysis_url: Option<String>,

    /// Compact JSON output
    #[arg(long)]
    pub compact: bool,
}
