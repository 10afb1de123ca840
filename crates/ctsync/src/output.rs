use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::view::MessageView;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

pub fn print_message(view: &MessageView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(view),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["kind".to_string(), view.kind.clone()]);
            table.add_row(vec!["seq".to_string(), view.seq.to_string()]);
            if let Some(channel) = view.channel {
                table.add_row(vec!["channel".to_string(), channel.to_string()]);
            }
            if !view.flags.is_empty() {
                table.add_row(vec!["flags".to_string(), view.flags.join(",")]);
            }
            for (name, value) in &view.fields {
                table.add_row(vec![name.clone(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(view)),
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn pretty_line(view: &MessageView) -> String {
    let mut line = format!("{} seq={} len={}", view.kind, view.seq, view.len);
    if let Some(channel) = view.channel {
        line.push_str(&format!(" channel={channel}"));
    }
    if !view.flags.is_empty() {
        line.push_str(&format!(" flags={}", view.flags.join(",")));
    }
    for (name, value) in &view.fields {
        line.push_str(&format!(" {name}=[{value}]"));
    }
    line
}
