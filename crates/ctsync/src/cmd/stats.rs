use ctsync_channel::{InterfaceTable, Multichannel, SystemInterfaces};
use serde::Serialize;

use crate::cmd::StatsArgs;
use crate::config;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

/// Configuration and link state of one channel.
///
/// The channels are opened only for this report, so they carry no traffic;
/// counters of a running listener come from `listen --stats`.
#[derive(Debug, Serialize)]
struct ChannelReport {
    index: usize,
    ifname: String,
    ifindex: u32,
    transport: &'static str,
    flags: String,
    mtu: usize,
    header_size: usize,
    buffer_capacity: Option<usize>,
    active: bool,
    running: Option<bool>,
}

impl ChannelReport {
    fn role(&self) -> &'static str {
        if self.active {
            "active"
        } else {
            "backup"
        }
    }

    fn link(&self) -> &'static str {
        match self.running {
            Some(true) => "running",
            Some(false) => "down",
            None => "unknown",
        }
    }

    fn buffer(&self) -> String {
        self.buffer_capacity
            .map_or_else(|| "-".to_string(), |c| c.to_string())
    }
}

pub fn run(args: StatsArgs, format: OutputFormat) -> CliResult<i32> {
    let confs = config::load(&args.config)?;
    let channels = Multichannel::open(&confs).map_err(|err| channel_error("open failed", err))?;

    match format {
        OutputFormat::Pretty => {
            for r in reports(&channels, &SystemInterfaces) {
                println!(
                    "{} {} device={} link={} role={} flags={} mtu={} buffer={}",
                    r.index,
                    r.transport.to_uppercase(),
                    r.ifname,
                    r.link(),
                    r.role(),
                    r.flags,
                    r.mtu,
                    r.buffer(),
                );
            }
        }
        OutputFormat::Json => print_json(&reports(&channels, &SystemInterfaces)),
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "#", "DEVICE", "TRANSPORT", "FLAGS", "MTU", "BUFFER", "ROLE", "LINK",
            ]);
            for r in reports(&channels, &SystemInterfaces) {
                table.add_row(vec![
                    r.index.to_string(),
                    r.ifname.clone(),
                    r.transport.to_string(),
                    r.flags.clone(),
                    r.mtu.to_string(),
                    r.buffer(),
                    r.role().to_string(),
                    r.link().to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(SUCCESS)
}

fn reports(channels: &Multichannel, table: &dyn InterfaceTable) -> Vec<ChannelReport> {
    channels
        .channels()
        .iter()
        .enumerate()
        .map(|(index, c)| ChannelReport {
            index,
            ifname: c.ifname().to_string(),
            ifindex: c.ifindex(),
            transport: c.transport_name(),
            flags: c.flags().to_string(),
            mtu: c.mtu(),
            header_size: c.headersiz(),
            buffer_capacity: c.buffer_capacity(),
            active: index == channels.current(),
            running: table.is_running(c.ifindex()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctsync_channel::{ChannelConf, ChannelFlags, TransportConf, UdpConf};

    struct Down;

    impl InterfaceTable for Down {
        fn name(&self, _ifindex: u32) -> Option<String> {
            None
        }
        fn is_running(&self, _ifindex: u32) -> Option<bool> {
            Some(false)
        }
    }

    #[test]
    fn reports_carry_configuration_only() {
        let conf = ChannelConf::new(
            "lo",
            ChannelFlags::DEFAULT,
            TransportConf::Udp(UdpConf {
                server: "127.0.0.1:0".parse().unwrap(),
                client: "127.0.0.1:9".parse().unwrap(),
                checksum: true,
                sndbuf: None,
                rcvbuf: None,
            }),
        );
        let channels = Multichannel::open(&[conf]).unwrap();
        let reports = reports(&channels, &Down);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].role(), "active");
        assert_eq!(reports[0].link(), "down");
        assert_eq!(reports[0].buffer(), "-");
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert!(json.get("traffic").is_none());
        assert_eq!(json["transport"], "udp");
    }
}
