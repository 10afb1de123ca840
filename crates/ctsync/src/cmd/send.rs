use std::fs;

use ctsync_channel::Multichannel;
use ctsync_wire::split_messages;
use serde::Serialize;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::config;
use crate::exit::{
    channel_error, decode_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS,
};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct SendReport<'a> {
    channel: usize,
    ifname: &'a str,
    transport: &'static str,
    messages: usize,
    bytes: usize,
    queued: usize,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let data = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let messages = split_payload(&data)?;

    let confs = config::load(&args.config)?;
    let mut channels =
        Multichannel::open(&confs).map_err(|err| channel_error("open failed", err))?;
    if let Some(index) = args.channel {
        channels
            .set_current(index)
            .map_err(|err| channel_error("invalid --channel", err))?;
    }

    let mut bytes = 0;
    for msg in &messages {
        channels
            .send(msg)
            .map_err(|err| channel_error("send failed", err))?;
        bytes += msg.len();
    }
    channels
        .send_flush()
        .map_err(|err| channel_error("flush failed", err))?;
    debug!(messages = messages.len(), bytes, "messages sent");

    let current = channels.current_channel();
    let report = SendReport {
        channel: channels.current(),
        ifname: current.ifname(),
        transport: current.transport_name(),
        messages: messages.len(),
        bytes,
        queued: current.queued(),
    };
    print_report(&report, format);
    Ok(SUCCESS)
}

/// Check framing up front so a bad file sends nothing.
fn split_payload(data: &[u8]) -> CliResult<Vec<&[u8]>> {
    let mut split = split_messages(data);
    let messages = split
        .by_ref()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| decode_error("invalid message framing", err))?;
    let trailing = split.remainder().len();
    if trailing > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("invalid message framing: {trailing} trailing bytes"),
        ));
    }
    Ok(messages)
}

fn print_report(report: &SendReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHANNEL", "DEVICE", "TRANSPORT", "MESSAGES", "BYTES"]);
            table.add_row(vec![
                report.channel.to_string(),
                report.ifname.to_string(),
                report.transport.to_string(),
                report.messages.to_string(),
                report.bytes.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "sent {} messages ({} bytes) on channel {} ({} via {}), {} queued for retry",
            report.messages,
            report.bytes,
            report.channel,
            report.transport,
            report.ifname,
            report.queued
        ),
    }
}
