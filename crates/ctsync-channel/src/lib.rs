//! Replication channels for conntrack state synchronisation.
//!
//! A [`Channel`] carries replication messages over one of four transports:
//! - IPv4/IPv6 multicast
//! - unicast UDP
//! - TCP (single peer, reconnecting)
//! - TIPC reliable datagrams
//!
//! A [`Multichannel`] groups up to [`MULTICHANNEL_MAX`] channels, sends on
//! the current one and receives from all of them. Channels expose their
//! descriptors so a caller-owned [`ReadSet`] can wait on every member at
//! once.

mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod iface;
mod mcast;
pub mod multichannel;
pub mod readiness;
mod sockopt;
pub mod stats;
mod tcp;
mod tipc;
mod udp;

pub use buffer::ERRORQ_MAX_LEN;
pub use channel::Channel;
pub use config::{ChannelConf, ChannelFlags, McastConf, TcpConf, TipcConf, TransportConf, UdpConf};
pub use error::{ChannelError, Result};
pub use iface::{InterfaceTable, SystemInterfaces};
pub use multichannel::{Multichannel, MULTICHANNEL_MAX};
pub use readiness::ReadSet;
pub use stats::{SocketStats, TrafficStats};
