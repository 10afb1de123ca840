use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod listen;
pub mod send;
pub mod stats;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the configured channels and print every message received.
    Listen(ListenArgs),
    /// Decode messages captured to a file.
    Decode(DecodeArgs),
    /// Send messages from a file through one channel.
    Send(SendArgs),
    /// Check that the configured channels open and show their settings
    /// and link state.
    ///
    /// Channels are opened afresh, so this may fail with "address in use"
    /// beside a running listener on the same ports. Traffic counters of a
    /// running listener are printed by `listen --stats`.
    Stats(StatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Stats(args) => stats::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel configuration file (TOML).
    #[arg(long, short = 'c', env = "CTSYNC_CONFIG")]
    pub config: PathBuf,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print channel counters to stderr on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding one or more messages back to back.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel configuration file (TOML).
    #[arg(long, short = 'c', env = "CTSYNC_CONFIG")]
    pub config: PathBuf,
    /// Index of the channel to send on. Default: the current channel.
    #[arg(long)]
    pub channel: Option<usize>,
    /// File holding one or more messages back to back.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Channel configuration file (TOML).
    #[arg(long, short = 'c', env = "CTSYNC_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
