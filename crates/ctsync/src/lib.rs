//! Conntrack state replication between firewall nodes.
//!
//! # Crate Structure
//!
//! - [`wire`]: message header, TLV attributes, table-driven decoders
//! - [`channel`]: multicast/UDP/TCP/TIPC channels and multichannel failover

/// Re-export wire format types.
pub mod wire {
    pub use ctsync_wire::*;
}

/// Re-export channel types.
pub mod channel {
    pub use ctsync_channel::*;
}
