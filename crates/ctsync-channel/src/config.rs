//! Channel configuration.
//!
//! A channel is described by an interface name, a flag set and exactly one
//! transport section. In TOML:
//! ```toml
//! [[channel]]
//! type = "udp"
//! ifname = "eth1"
//! flags = ["default", "buffered"]
//! server = "192.168.100.1:3780"
//! client = "192.168.100.2:3780"
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::BitOr;

use serde::Deserialize;

use crate::error::{ChannelError, Result};

/// Longest interface name the kernel accepts, excluding the terminator.
pub const IFNAMSIZ_MAX: usize = libc::IFNAMSIZ - 1;

/// Behaviour switches for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct ChannelFlags(u8);

impl ChannelFlags {
    pub const NONE: Self = Self(0);
    /// Start as the current channel of a multichannel.
    pub const DEFAULT: Self = Self(1 << 0);
    /// Pack messages into MTU-sized datagrams.
    pub const BUFFERED: Self = Self(1 << 1);
    /// Byte stream transport; receivers must reassemble messages.
    pub const STREAM: Self = Self(1 << 2);
    /// Keep messages whose send failed and retry them.
    pub const ERRORS: Self = Self(1 << 3);

    const NAMES: [(&'static str, Self); 4] = [
        ("default", Self::DEFAULT),
        ("buffered", Self::BUFFERED),
        ("stream", Self::STREAM),
        ("errors", Self::ERRORS),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, f)| *f)
    }

    /// Names of the flags that are set, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, f)| self.contains(*f))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl BitOr for ChannelFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ChannelFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

impl TryFrom<Vec<String>> for ChannelFlags {
    type Error = String;

    fn try_from(names: Vec<String>) -> std::result::Result<Self, String> {
        names.iter().try_fold(Self::NONE, |acc, name| {
            Self::from_name(name)
                .map(|f| acc | f)
                .ok_or_else(|| format!("unknown channel flag '{name}'"))
        })
    }
}

fn default_true() -> bool {
    true
}

/// Multicast transport parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McastConf {
    /// IPv4 or IPv6 multicast group.
    pub group: IpAddr,
    pub port: u16,
    /// Local IPv4 address of the interface; IPv6 groups use the interface index.
    #[serde(default)]
    pub interface_addr: Option<Ipv4Addr>,
    /// UDP checksums; disabling sets `SO_NO_CHECK`.
    #[serde(default = "default_true")]
    pub checksum: bool,
    #[serde(default)]
    pub sndbuf: Option<usize>,
    #[serde(default)]
    pub rcvbuf: Option<usize>,
}

/// Unicast UDP transport parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UdpConf {
    /// Local address to receive on.
    pub server: SocketAddr,
    /// Peer address to send to.
    pub client: SocketAddr,
    #[serde(default = "default_true")]
    pub checksum: bool,
    #[serde(default)]
    pub sndbuf: Option<usize>,
    #[serde(default)]
    pub rcvbuf: Option<usize>,
}

/// TCP transport parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TcpConf {
    /// Local address to listen on.
    pub server: SocketAddr,
    /// Peer address to connect to.
    pub client: SocketAddr,
    #[serde(default)]
    pub sndbuf: Option<usize>,
    #[serde(default)]
    pub rcvbuf: Option<usize>,
}

/// TIPC transport parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TipcConf {
    /// Service type of the name both peers use.
    pub service: u32,
    /// Instance the server binds and the client sends to.
    pub instance: u32,
    #[serde(default)]
    pub sndbuf: Option<usize>,
    #[serde(default)]
    pub rcvbuf: Option<usize>,
}

/// Transport selection with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConf {
    Mcast(McastConf),
    Udp(UdpConf),
    Tcp(TcpConf),
    Tipc(TipcConf),
}

impl TransportConf {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mcast(_) => "multicast",
            Self::Udp(_) => "udp",
            Self::Tcp(_) => "tcp",
            Self::Tipc(_) => "tipc",
        }
    }
}

/// One channel as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConf {
    pub ifname: String,
    #[serde(default)]
    pub flags: ChannelFlags,
    #[serde(flatten)]
    pub transport: TransportConf,
}

impl ChannelConf {
    pub fn new(ifname: impl Into<String>, flags: ChannelFlags, transport: TransportConf) -> Self {
        Self {
            ifname: ifname.into(),
            flags,
            transport,
        }
    }

    /// Configured flags plus those the transport always needs.
    pub fn effective_flags(&self) -> ChannelFlags {
        match self.transport {
            TransportConf::Tcp(_) => self.flags | ChannelFlags::STREAM | ChannelFlags::ERRORS,
            _ => self.flags,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ifname.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "interface name is empty".to_string(),
            ));
        }
        if self.ifname.len() > IFNAMSIZ_MAX {
            return Err(ChannelError::InvalidConfig(format!(
                "interface name '{}' longer than {IFNAMSIZ_MAX} bytes",
                self.ifname
            )));
        }
        match &self.transport {
            TransportConf::Mcast(m) if !m.group.is_multicast() => Err(
                ChannelError::InvalidConfig(format!("{} is not a multicast group", m.group)),
            ),
            TransportConf::Mcast(McastConf {
                group: IpAddr::V6(_),
                interface_addr: Some(_),
                ..
            }) => Err(ChannelError::InvalidConfig(
                "interface_addr only applies to IPv4 groups".to_string(),
            )),
            TransportConf::Udp(u) if u.server.is_ipv4() != u.client.is_ipv4() => Err(
                ChannelError::InvalidConfig("udp server and client families differ".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct File {
        channel: Vec<ChannelConf>,
    }

    fn parse(toml_text: &str) -> Vec<ChannelConf> {
        toml::from_str::<File>(toml_text).unwrap().channel
    }

    #[test]
    fn parses_every_transport() {
        let confs = parse(
            r#"
            [[channel]]
            type = "mcast"
            ifname = "eth1"
            flags = ["default"]
            group = "225.0.0.50"
            port = 3780
            interface_addr = "192.168.100.1"
            checksum = false

            [[channel]]
            type = "udp"
            ifname = "eth2"
            server = "10.0.0.1:3781"
            client = "10.0.0.2:3781"

            [[channel]]
            type = "tcp"
            ifname = "eth3"
            flags = ["buffered"]
            server = "10.0.1.1:3782"
            client = "10.0.1.2:3782"
            sndbuf = 1048576

            [[channel]]
            type = "tipc"
            ifname = "eth4"
            service = 5000
            instance = 1
            "#,
        );

        assert_eq!(confs.len(), 4);
        match &confs[0].transport {
            TransportConf::Mcast(m) => {
                assert_eq!(m.group, "225.0.0.50".parse::<IpAddr>().unwrap());
                assert_eq!(m.interface_addr, Some(Ipv4Addr::new(192, 168, 100, 1)));
                assert!(!m.checksum);
            }
            other => panic!("unexpected transport {other:?}"),
        }
        assert_eq!(confs[0].flags, ChannelFlags::DEFAULT);
        assert!(matches!(&confs[1].transport, TransportConf::Udp(u) if u.checksum));
        assert_eq!(confs[1].flags, ChannelFlags::NONE);
        assert!(matches!(&confs[2].transport, TransportConf::Tcp(t) if t.sndbuf == Some(1_048_576)));
        assert!(matches!(
            &confs[3].transport,
            TransportConf::Tipc(TipcConf { service: 5000, instance: 1, .. })
        ));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = toml::from_str::<File>(
            r#"
            [[channel]]
            type = "udp"
            ifname = "lo"
            flags = ["fast"]
            server = "127.0.0.1:1"
            client = "127.0.0.1:2"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown channel flag"));
    }

    #[test]
    fn tcp_implies_stream_and_errors() {
        let conf = ChannelConf::new(
            "lo",
            ChannelFlags::BUFFERED,
            TransportConf::Tcp(TcpConf {
                server: "127.0.0.1:0".parse().unwrap(),
                client: "127.0.0.1:1".parse().unwrap(),
                sndbuf: None,
                rcvbuf: None,
            }),
        );
        let flags = conf.effective_flags();
        assert!(flags.contains(ChannelFlags::STREAM));
        assert!(flags.contains(ChannelFlags::ERRORS));
        assert!(flags.contains(ChannelFlags::BUFFERED));
        assert!(!flags.contains(ChannelFlags::DEFAULT));
    }

    #[test]
    fn validation() {
        let mcast = |group: &str| {
            ChannelConf::new(
                "eth0",
                ChannelFlags::NONE,
                TransportConf::Mcast(McastConf {
                    group: group.parse().unwrap(),
                    port: 3780,
                    interface_addr: None,
                    checksum: true,
                    sndbuf: None,
                    rcvbuf: None,
                }),
            )
        };

        assert!(mcast("225.0.0.50").validate().is_ok());
        assert!(mcast("ff02::1:3").validate().is_ok());
        assert!(matches!(
            mcast("10.0.0.1").validate(),
            Err(ChannelError::InvalidConfig(_))
        ));

        let mut conf = mcast("225.0.0.50");
        conf.ifname.clear();
        assert!(matches!(conf.validate(), Err(ChannelError::InvalidConfig(_))));
        conf.ifname = "x".repeat(IFNAMSIZ_MAX + 1);
        assert!(matches!(conf.validate(), Err(ChannelError::InvalidConfig(_))));
    }

    #[test]
    fn flag_names_roundtrip() {
        let flags = ChannelFlags::DEFAULT | ChannelFlags::ERRORS;
        assert_eq!(flags.names(), vec!["default", "errors"]);
        assert_eq!(flags.to_string(), "default,errors");
        assert_eq!(ChannelFlags::from_name("Buffered"), Some(ChannelFlags::BUFFERED));
    }
}
