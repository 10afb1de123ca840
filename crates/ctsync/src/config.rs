use std::fs;
use std::path::Path;

use ctsync_channel::ChannelConf;
use serde::Deserialize;

use crate::exit::{CliError, CliResult, CONFIG};

/// Top level of a channel configuration file.
///
/// ```toml
/// [[channel]]
/// type = "udp"
/// ifname = "eth1"
/// flags = ["default"]
/// server = "10.0.0.1:3780"
/// client = "10.0.0.2:3780"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(rename = "channel", default)]
    channels: Vec<ChannelConf>,
}

pub fn load(path: &Path) -> CliResult<Vec<ChannelConf>> {
    let text = fs::read_to_string(path).map_err(|err| {
        CliError::new(CONFIG, format!("failed reading {}: {err}", path.display()))
    })?;
    parse(&text).map_err(|err| CliError::new(CONFIG, format!("{}: {err}", path.display())))
}

fn parse(text: &str) -> Result<Vec<ChannelConf>, toml::de::Error> {
    toml::from_str::<ConfigFile>(text).map(|file| file.channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctsync_channel::{ChannelFlags, TransportConf};

    #[test]
    fn parses_channel_tables() {
        let confs = parse(
            r#"
            [[channel]]
            type = "udp"
            ifname = "lo"
            flags = ["default", "buffered"]
            server = "127.0.0.1:3780"
            client = "127.0.0.1:3781"

            [[channel]]
            type = "tcp"
            ifname = "lo"
            server = "127.0.0.1:3782"
            client = "127.0.0.1:3783"
            "#,
        )
        .unwrap();

        assert_eq!(confs.len(), 2);
        assert_eq!(confs[0].flags, ChannelFlags::DEFAULT | ChannelFlags::BUFFERED);
        assert!(matches!(confs[1].transport, TransportConf::Tcp(_)));
    }

    #[test]
    fn empty_file_has_no_channels() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        assert!(parse("channels = []").is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load(Path::new("/nonexistent/ctsync.toml")).unwrap_err();
        assert_eq!(err.code, CONFIG);
    }
}
