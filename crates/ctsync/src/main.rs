mod cmd;
mod config;
mod exit;
mod logging;
mod output;
mod view;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ctsync", version, about = "Conntrack replication channels and wire decoding")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_channel_index() {
        let cli = Cli::try_parse_from([
            "ctsync",
            "send",
            "--config",
            "/etc/ctsync.toml",
            "--channel",
            "1",
            "update.bin",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => assert_eq!(args.channel, Some(1)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn listen_requires_config() {
        let err = Cli::try_parse_from(["ctsync", "listen"]).expect_err("config is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["ctsync", "decode", "dump.bin", "--format", "json"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
