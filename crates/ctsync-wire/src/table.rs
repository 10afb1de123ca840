//! Attribute dispatch tables.
//!
//! Both tables are indexed by attribute id and built at compile time. Each
//! entry names the decode rule (target field and width) and the exact
//! `nta_len` an attribute with that id must carry. Reserved entries have
//! no size and are skipped.

use bytes::Buf;

use crate::attr::{nta, nta_exp, nta_size};
use crate::object::{ConntrackObject, CtAttr, CtGroup, ExpAttr, ExpTuple, ExpectationObject};

/// NAT sequence adjustment payload: six 32-bit fields.
pub const NAT_SEQ_ADJ_SIZE: usize = 24;

/// Targets of the NAT sequence adjustment fields, in wire order.
pub const NAT_SEQ_ADJ_ATTRS: [CtAttr; 6] = [
    CtAttr::OrigNatSeqCorrectionPos,
    CtAttr::OrigNatSeqOffsetBefore,
    CtAttr::OrigNatSeqOffsetAfter,
    CtAttr::ReplNatSeqCorrectionPos,
    CtAttr::ReplNatSeqOffsetBefore,
    CtAttr::ReplNatSeqOffsetAfter,
];

/// How a conntrack attribute payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtRule {
    /// Known id that this peer does not decode.
    Reserved,
    U8(CtAttr),
    U16(CtAttr),
    U32(CtAttr),
    Group(CtGroup),
    NatSeqAdj,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtEntry {
    pub rule: CtRule,
    /// Exact `nta_len`, or `None` for reserved ids.
    pub size: Option<usize>,
}

impl CtEntry {
    const fn u8(attr: CtAttr) -> Self {
        Self {
            rule: CtRule::U8(attr),
            size: Some(nta_size(1)),
        }
    }

    const fn u16(attr: CtAttr) -> Self {
        Self {
            rule: CtRule::U16(attr),
            size: Some(nta_size(2)),
        }
    }

    const fn u32(attr: CtAttr) -> Self {
        Self {
            rule: CtRule::U32(attr),
            size: Some(nta_size(4)),
        }
    }

    const fn group(group: CtGroup) -> Self {
        Self {
            rule: CtRule::Group(group),
            size: Some(nta_size(group.size())),
        }
    }

    const fn nat_seq_adj() -> Self {
        Self {
            rule: CtRule::NatSeqAdj,
            size: Some(nta_size(NAT_SEQ_ADJ_SIZE)),
        }
    }

    const fn reserved() -> Self {
        Self {
            rule: CtRule::Reserved,
            size: None,
        }
    }
}

/// Conntrack dispatch table, indexed by [`nta`] id.
pub static CT_TABLE: [CtEntry; nta::MAX] = [
    CtEntry::group(CtGroup::OrigIpv4),      // IPV4
    CtEntry::group(CtGroup::OrigIpv6),      // IPV6
    CtEntry::u8(CtAttr::L4Proto),           // L4PROTO
    CtEntry::group(CtGroup::OrigPort),      // PORT
    CtEntry::u8(CtAttr::TcpState),          // TCP_STATE
    CtEntry::u32(CtAttr::Status),           // STATUS
    CtEntry::u32(CtAttr::Timeout),          // TIMEOUT
    CtEntry::u32(CtAttr::Mark),             // MARK
    CtEntry::group(CtGroup::MasterIpv4),    // MASTER_IPV4
    CtEntry::group(CtGroup::MasterIpv6),    // MASTER_IPV6
    CtEntry::u8(CtAttr::MasterL4Proto),     // MASTER_L4PROTO
    CtEntry::group(CtGroup::MasterPort),    // MASTER_PORT
    CtEntry::u32(CtAttr::SnatIpv4),         // SNAT_IPV4
    CtEntry::u32(CtAttr::DnatIpv4),         // DNAT_IPV4
    CtEntry::u16(CtAttr::SnatPort),         // SPAT_PORT
    CtEntry::u16(CtAttr::DnatPort),         // DPAT_PORT
    CtEntry::nat_seq_adj(),                 // NAT_SEQ_ADJ
    CtEntry::u8(CtAttr::SctpState),         // SCTP_STATE
    CtEntry::u32(CtAttr::SctpVtagOrig),     // SCTP_VTAG_ORIG
    CtEntry::u32(CtAttr::SctpVtagRepl),     // SCTP_VTAG_REPL
    CtEntry::u8(CtAttr::DccpState),         // DCCP_STATE
    CtEntry::u8(CtAttr::DccpRole),          // DCCP_ROLE
    CtEntry::u8(CtAttr::IcmpType),          // ICMP_TYPE
    CtEntry::u8(CtAttr::IcmpCode),          // ICMP_CODE
    CtEntry::u16(CtAttr::IcmpId),           // ICMP_ID
    CtEntry::u8(CtAttr::TcpWscaleOrig),     // TCP_WSCALE_ORIG
    CtEntry::u8(CtAttr::TcpWscaleRepl),     // TCP_WSCALE_REPL
    CtEntry::reserved(),                    // HELPER_NAME
    CtEntry::reserved(),                    // LABELS
    CtEntry::reserved(),                    // SNAT_IPV6
    CtEntry::reserved(),                    // DNAT_IPV6
    CtEntry::reserved(),                    // SYNPROXY
];

impl CtRule {
    /// Write `payload` into `ct`. The caller has already checked the
    /// payload against the entry size.
    pub(crate) fn apply<C: ConntrackObject>(self, ct: &mut C, payload: &[u8]) {
        let mut src = payload;
        match self {
            Self::Reserved => {}
            Self::U8(attr) => ct.set_u8(attr, src.get_u8()),
            Self::U16(attr) => ct.set_u16(attr, src.get_u16()),
            Self::U32(attr) => ct.set_u32(attr, src.get_u32()),
            Self::Group(group) => ct.set_group(group, payload),
            Self::NatSeqAdj => {
                for attr in NAT_SEQ_ADJ_ATTRS {
                    ct.set_u32(attr, src.get_u32());
                }
            }
        }
    }
}

/// Field of a tuple object an expectation attribute writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleField {
    U8(CtAttr),
    Group(CtGroup),
}

/// How an expectation attribute payload is decoded, and where it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpRule {
    /// Known id that this peer does not decode.
    Reserved,
    /// Written to exactly one of the master/expected/mask tuples.
    Tuple { tuple: ExpTuple, field: TupleField },
    /// Written to the expectation itself.
    U32(ExpAttr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpEntry {
    pub rule: ExpRule,
    /// Exact `nta_len`, or `None` for reserved ids.
    pub size: Option<usize>,
}

impl ExpEntry {
    const fn group(tuple: ExpTuple, group: CtGroup) -> Self {
        Self {
            rule: ExpRule::Tuple {
                tuple,
                field: TupleField::Group(group),
            },
            size: Some(nta_size(group.size())),
        }
    }

    const fn l4proto(tuple: ExpTuple) -> Self {
        Self {
            rule: ExpRule::Tuple {
                tuple,
                field: TupleField::U8(CtAttr::L4Proto),
            },
            size: Some(nta_size(1)),
        }
    }

    const fn u32(attr: ExpAttr) -> Self {
        Self {
            rule: ExpRule::U32(attr),
            size: Some(nta_size(4)),
        }
    }

    const fn reserved() -> Self {
        Self {
            rule: ExpRule::Reserved,
            size: None,
        }
    }
}

/// Expectation dispatch table, indexed by [`nta_exp`] id.
///
/// Tuple attributes reuse the `orig` groups on whichever tuple they are
/// routed to.
pub static EXP_TABLE: [ExpEntry; nta_exp::MAX] = [
    ExpEntry::group(ExpTuple::Master, CtGroup::OrigIpv4),   // MASTER_IPV4
    ExpEntry::group(ExpTuple::Master, CtGroup::OrigIpv6),   // MASTER_IPV6
    ExpEntry::l4proto(ExpTuple::Master),                    // MASTER_L4PROTO
    ExpEntry::group(ExpTuple::Master, CtGroup::OrigPort),   // MASTER_PORT
    ExpEntry::group(ExpTuple::Expected, CtGroup::OrigIpv4), // EXPECT_IPV4
    ExpEntry::group(ExpTuple::Expected, CtGroup::OrigIpv6), // EXPECT_IPV6
    ExpEntry::l4proto(ExpTuple::Expected),                  // EXPECT_L4PROTO
    ExpEntry::group(ExpTuple::Expected, CtGroup::OrigPort), // EXPECT_PORT
    ExpEntry::group(ExpTuple::Mask, CtGroup::OrigIpv4),     // MASK_IPV4
    ExpEntry::group(ExpTuple::Mask, CtGroup::OrigIpv6),     // MASK_IPV6
    ExpEntry::l4proto(ExpTuple::Mask),                      // MASK_L4PROTO
    ExpEntry::group(ExpTuple::Mask, CtGroup::OrigPort),     // MASK_PORT
    ExpEntry::u32(ExpAttr::Timeout),                        // TIMEOUT
    ExpEntry::u32(ExpAttr::Flags),                          // FLAGS
    ExpEntry::reserved(),                                   // CLASS
    ExpEntry::reserved(),                                   // NAT_IPV4
    ExpEntry::reserved(),                                   // NAT_L4PROTO
    ExpEntry::reserved(),                                   // NAT_PORT
    ExpEntry::reserved(),                                   // NAT_DIR
    ExpEntry::reserved(),                                   // HELPER_NAME
    ExpEntry::reserved(),                                   // FN
];

impl TupleField {
    pub(crate) fn apply<C: ConntrackObject>(self, ct: &mut C, payload: &[u8]) {
        match self {
            Self::U8(attr) => {
                let mut src = payload;
                ct.set_u8(attr, src.get_u8());
            }
            Self::Group(group) => ct.set_group(group, payload),
        }
    }
}

impl ExpAttr {
    pub(crate) fn apply<E: ExpectationObject>(self, exp: &mut E, payload: &[u8]) {
        let mut src = payload;
        exp.set_u32(self, src.get_u32());
    }
}
