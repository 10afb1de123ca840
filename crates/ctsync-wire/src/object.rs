//! Conntrack and expectation objects populated by the decoders.
//!
//! The decoders only talk to the [`ConntrackObject`] and
//! [`ExpectationObject`] traits, so a binding to the system conntrack
//! library can stand in for the in-crate [`Conntrack`] and [`Expectation`].

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

/// Scalar conntrack attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CtAttr {
    L4Proto,
    TcpState,
    Status,
    Mark,
    Timeout,
    MasterL4Proto,
    SnatIpv4,
    DnatIpv4,
    SnatPort,
    DnatPort,
    OrigNatSeqCorrectionPos,
    OrigNatSeqOffsetBefore,
    OrigNatSeqOffsetAfter,
    ReplNatSeqCorrectionPos,
    ReplNatSeqOffsetBefore,
    ReplNatSeqOffsetAfter,
    SctpState,
    SctpVtagOrig,
    SctpVtagRepl,
    DccpState,
    DccpRole,
    IcmpType,
    IcmpCode,
    IcmpId,
    TcpWscaleOrig,
    TcpWscaleRepl,
}

impl CtAttr {
    pub fn name(self) -> &'static str {
        match self {
            Self::L4Proto => "l4proto",
            Self::TcpState => "tcp-state",
            Self::Status => "status",
            Self::Mark => "mark",
            Self::Timeout => "timeout",
            Self::MasterL4Proto => "master-l4proto",
            Self::SnatIpv4 => "snat-ipv4",
            Self::DnatIpv4 => "dnat-ipv4",
            Self::SnatPort => "snat-port",
            Self::DnatPort => "dnat-port",
            Self::OrigNatSeqCorrectionPos => "orig-nat-seq-correction-pos",
            Self::OrigNatSeqOffsetBefore => "orig-nat-seq-offset-before",
            Self::OrigNatSeqOffsetAfter => "orig-nat-seq-offset-after",
            Self::ReplNatSeqCorrectionPos => "repl-nat-seq-correction-pos",
            Self::ReplNatSeqOffsetBefore => "repl-nat-seq-offset-before",
            Self::ReplNatSeqOffsetAfter => "repl-nat-seq-offset-after",
            Self::SctpState => "sctp-state",
            Self::SctpVtagOrig => "sctp-vtag-orig",
            Self::SctpVtagRepl => "sctp-vtag-repl",
            Self::DccpState => "dccp-state",
            Self::DccpRole => "dccp-role",
            Self::IcmpType => "icmp-type",
            Self::IcmpCode => "icmp-code",
            Self::IcmpId => "icmp-id",
            Self::TcpWscaleOrig => "tcp-wscale-orig",
            Self::TcpWscaleRepl => "tcp-wscale-repl",
        }
    }
}

/// Composite address/port attributes, kept as opaque blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CtGroup {
    OrigIpv4,
    OrigIpv6,
    OrigPort,
    MasterIpv4,
    MasterIpv6,
    MasterPort,
}

/// IPv4 group: source then destination address, network order.
pub const GRP_IPV4_SIZE: usize = 8;
/// IPv6 group: source then destination address, network order.
pub const GRP_IPV6_SIZE: usize = 32;
/// Port group: source then destination port, network order.
pub const GRP_PORT_SIZE: usize = 4;

impl CtGroup {
    /// Fixed size of the group's block.
    pub const fn size(self) -> usize {
        match self {
            Self::OrigIpv4 | Self::MasterIpv4 => GRP_IPV4_SIZE,
            Self::OrigIpv6 | Self::MasterIpv6 => GRP_IPV6_SIZE,
            Self::OrigPort | Self::MasterPort => GRP_PORT_SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OrigIpv4 => "orig-ipv4",
            Self::OrigIpv6 => "orig-ipv6",
            Self::OrigPort => "orig-port",
            Self::MasterIpv4 => "master-ipv4",
            Self::MasterIpv6 => "master-ipv6",
            Self::MasterPort => "master-port",
        }
    }
}

/// Which tuple of an expectation an attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpTuple {
    Master,
    Expected,
    Mask,
}

impl ExpTuple {
    pub fn name(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Expected => "expected",
            Self::Mask => "mask",
        }
    }
}

/// Scalar attributes held directly by an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpAttr {
    Timeout,
    Flags,
}

/// A decoded scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl AttrValue {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::U8(v) => u32::from(v),
            Self::U16(v) => u32::from(v),
            Self::U32(v) => v,
        }
    }
}

/// Operations the decoder needs from a conntrack object.
pub trait ConntrackObject: Sized {
    /// Construct an empty object, or `None` if it cannot be allocated.
    fn try_new() -> Option<Self>;
    fn set_u8(&mut self, attr: CtAttr, value: u8);
    fn set_u16(&mut self, attr: CtAttr, value: u16);
    fn set_u32(&mut self, attr: CtAttr, value: u32);
    /// Store a group block verbatim. `data.len()` equals `group.size()`.
    fn set_group(&mut self, group: CtGroup, data: &[u8]);
}

/// Operations the decoder needs from an expectation object.
pub trait ExpectationObject: Sized {
    type Tuple: ConntrackObject;

    fn try_new() -> Option<Self>;
    /// Attach a copy of `tuple`; the caller keeps ownership of the original.
    fn set_tuple(&mut self, which: ExpTuple, tuple: &Self::Tuple);
    fn set_u32(&mut self, attr: ExpAttr, value: u32);
}

/// In-memory conntrack entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conntrack {
    attrs: BTreeMap<CtAttr, AttrValue>,
    groups: BTreeMap<CtGroup, Bytes>,
}

impl Conntrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.groups.is_empty()
    }

    pub fn get(&self, attr: CtAttr) -> Option<AttrValue> {
        self.attrs.get(&attr).copied()
    }

    pub fn get_u8(&self, attr: CtAttr) -> Option<u8> {
        match self.get(attr)? {
            AttrValue::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_u16(&self, attr: CtAttr) -> Option<u16> {
        match self.get(attr)? {
            AttrValue::U16(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_u32(&self, attr: CtAttr) -> Option<u32> {
        match self.get(attr)? {
            AttrValue::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Raw group block as received.
    pub fn group(&self, group: CtGroup) -> Option<&[u8]> {
        self.groups.get(&group).map(|b| b.as_ref())
    }

    /// All scalar attributes in a stable order.
    pub fn attrs(&self) -> impl Iterator<Item = (CtAttr, AttrValue)> + '_ {
        self.attrs.iter().map(|(k, v)| (*k, *v))
    }

    /// All group blocks in a stable order.
    pub fn groups(&self) -> impl Iterator<Item = (CtGroup, &[u8])> + '_ {
        self.groups.iter().map(|(k, v)| (*k, v.as_ref()))
    }

    /// Source and destination of an IPv4 group.
    pub fn ipv4_pair(&self, group: CtGroup) -> Option<(Ipv4Addr, Ipv4Addr)> {
        let data = self.group(group)?;
        if data.len() != GRP_IPV4_SIZE {
            return None;
        }
        let src: [u8; 4] = data[..4].try_into().ok()?;
        let dst: [u8; 4] = data[4..].try_into().ok()?;
        Some((Ipv4Addr::from(src), Ipv4Addr::from(dst)))
    }

    /// Source and destination of an IPv6 group.
    pub fn ipv6_pair(&self, group: CtGroup) -> Option<(Ipv6Addr, Ipv6Addr)> {
        let data = self.group(group)?;
        if data.len() != GRP_IPV6_SIZE {
            return None;
        }
        let src: [u8; 16] = data[..16].try_into().ok()?;
        let dst: [u8; 16] = data[16..].try_into().ok()?;
        Some((Ipv6Addr::from(src), Ipv6Addr::from(dst)))
    }

    /// Source and destination ports of a port group.
    pub fn port_pair(&self, group: CtGroup) -> Option<(u16, u16)> {
        let data = self.group(group)?;
        if data.len() != GRP_PORT_SIZE {
            return None;
        }
        Some((
            u16::from_be_bytes([data[0], data[1]]),
            u16::from_be_bytes([data[2], data[3]]),
        ))
    }

    /// Set an IPv4 group from typed addresses.
    pub fn set_ipv4_pair(&mut self, group: CtGroup, src: Ipv4Addr, dst: Ipv4Addr) {
        let mut data = [0u8; GRP_IPV4_SIZE];
        data[..4].copy_from_slice(&src.octets());
        data[4..].copy_from_slice(&dst.octets());
        self.set_group(group, &data);
    }

    /// Set an IPv6 group from typed addresses.
    pub fn set_ipv6_pair(&mut self, group: CtGroup, src: Ipv6Addr, dst: Ipv6Addr) {
        let mut data = [0u8; GRP_IPV6_SIZE];
        data[..16].copy_from_slice(&src.octets());
        data[16..].copy_from_slice(&dst.octets());
        self.set_group(group, &data);
    }

    /// Set a port group from host-order ports.
    pub fn set_port_pair(&mut self, group: CtGroup, sport: u16, dport: u16) {
        let mut data = [0u8; GRP_PORT_SIZE];
        data[..2].copy_from_slice(&sport.to_be_bytes());
        data[2..].copy_from_slice(&dport.to_be_bytes());
        self.set_group(group, &data);
    }
}

impl ConntrackObject for Conntrack {
    fn try_new() -> Option<Self> {
        Some(Self::default())
    }

    fn set_u8(&mut self, attr: CtAttr, value: u8) {
        self.attrs.insert(attr, AttrValue::U8(value));
    }

    fn set_u16(&mut self, attr: CtAttr, value: u16) {
        self.attrs.insert(attr, AttrValue::U16(value));
    }

    fn set_u32(&mut self, attr: CtAttr, value: u32) {
        self.attrs.insert(attr, AttrValue::U32(value));
    }

    fn set_group(&mut self, group: CtGroup, data: &[u8]) {
        self.groups.insert(group, Bytes::copy_from_slice(data));
    }
}

/// In-memory expectation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    master: Option<Conntrack>,
    expected: Option<Conntrack>,
    mask: Option<Conntrack>,
    timeout: Option<u32>,
    flags: Option<u32>,
}

impl Expectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tuple(&self, which: ExpTuple) -> Option<&Conntrack> {
        match which {
            ExpTuple::Master => self.master.as_ref(),
            ExpTuple::Expected => self.expected.as_ref(),
            ExpTuple::Mask => self.mask.as_ref(),
        }
    }

    pub fn get_u32(&self, attr: ExpAttr) -> Option<u32> {
        match attr {
            ExpAttr::Timeout => self.timeout,
            ExpAttr::Flags => self.flags,
        }
    }
}

impl ExpectationObject for Expectation {
    type Tuple = Conntrack;

    fn try_new() -> Option<Self> {
        Some(Self::default())
    }

    fn set_tuple(&mut self, which: ExpTuple, tuple: &Conntrack) {
        let slot = match which {
            ExpTuple::Master => &mut self.master,
            ExpTuple::Expected => &mut self.expected,
            ExpTuple::Mask => &mut self.mask,
        };
        *slot = Some(tuple.clone());
    }

    fn set_u32(&mut self, attr: ExpAttr, value: u32) {
        match attr {
            ExpAttr::Timeout => self.timeout = Some(value),
            ExpAttr::Flags => self.flags = Some(value),
        }
    }
}
