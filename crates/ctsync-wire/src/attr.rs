//! Attribute (TLV) records and their identifiers.
//!
//! Each record is laid out as:
//! ```text
//! ┌───────────────┬────────────────┬─────────────────────┬──────────┐
//! │ nta_len (2B)  │ nta_attr (2B)  │ payload             │ padding  │
//! │ big-endian    │ big-endian     │ nta_len - 4 bytes   │ to 4B    │
//! └───────────────┴────────────────┴─────────────────────┴──────────┘
//! ```
//! `nta_len` counts the 4-byte attribute header plus the payload, but not
//! the alignment padding.

use bytes::Buf;

use crate::error::{DecodeError, Result};

/// Size of the attribute header (length + id).
pub const NETATTR_SIZ: usize = 4;

/// Attribute records start on 4-byte boundaries.
pub const NTA_ALIGNTO: usize = 4;

/// Round `len` up to the attribute alignment.
pub const fn nta_align(len: usize) -> usize {
    (len + NTA_ALIGNTO - 1) & !(NTA_ALIGNTO - 1)
}

/// Encoded `nta_len` of an attribute carrying `payload` bytes.
pub const fn nta_size(payload: usize) -> usize {
    nta_align(NETATTR_SIZ) + payload
}

/// Conntrack attribute identifiers.
pub mod nta {
    pub const IPV4: u16 = 0;
    pub const IPV6: u16 = 1;
    pub const L4PROTO: u16 = 2;
    pub const PORT: u16 = 3;
    pub const TCP_STATE: u16 = 4;
    pub const STATUS: u16 = 5;
    pub const TIMEOUT: u16 = 6;
    pub const MARK: u16 = 7;
    pub const MASTER_IPV4: u16 = 8;
    pub const MASTER_IPV6: u16 = 9;
    pub const MASTER_L4PROTO: u16 = 10;
    pub const MASTER_PORT: u16 = 11;
    pub const SNAT_IPV4: u16 = 12;
    pub const DNAT_IPV4: u16 = 13;
    pub const SPAT_PORT: u16 = 14;
    pub const DPAT_PORT: u16 = 15;
    pub const NAT_SEQ_ADJ: u16 = 16;
    pub const SCTP_STATE: u16 = 17;
    pub const SCTP_VTAG_ORIG: u16 = 18;
    pub const SCTP_VTAG_REPL: u16 = 19;
    pub const DCCP_STATE: u16 = 20;
    pub const DCCP_ROLE: u16 = 21;
    pub const ICMP_TYPE: u16 = 22;
    pub const ICMP_CODE: u16 = 23;
    pub const ICMP_ID: u16 = 24;
    pub const TCP_WSCALE_ORIG: u16 = 25;
    pub const TCP_WSCALE_REPL: u16 = 26;
    // Sent by newer peers; skipped here.
    pub const HELPER_NAME: u16 = 27;
    pub const LABELS: u16 = 28;
    pub const SNAT_IPV6: u16 = 29;
    pub const DNAT_IPV6: u16 = 30;
    pub const SYNPROXY: u16 = 31;
    /// Number of conntrack attribute ids.
    pub const MAX: usize = 32;
}

/// Expectation attribute identifiers.
pub mod nta_exp {
    pub const MASTER_IPV4: u16 = 0;
    pub const MASTER_IPV6: u16 = 1;
    pub const MASTER_L4PROTO: u16 = 2;
    pub const MASTER_PORT: u16 = 3;
    pub const EXPECT_IPV4: u16 = 4;
    pub const EXPECT_IPV6: u16 = 5;
    pub const EXPECT_L4PROTO: u16 = 6;
    pub const EXPECT_PORT: u16 = 7;
    pub const MASK_IPV4: u16 = 8;
    pub const MASK_IPV6: u16 = 9;
    pub const MASK_L4PROTO: u16 = 10;
    pub const MASK_PORT: u16 = 11;
    pub const TIMEOUT: u16 = 12;
    pub const FLAGS: u16 = 13;
    // Sent by newer peers; skipped here.
    pub const CLASS: u16 = 14;
    pub const NAT_IPV4: u16 = 15;
    pub const NAT_L4PROTO: u16 = 16;
    pub const NAT_PORT: u16 = 17;
    pub const NAT_DIR: u16 = 18;
    pub const HELPER_NAME: u16 = 19;
    pub const FN: u16 = 20;
    /// Number of expectation attribute ids.
    pub const MAX: usize = 21;
}

/// One attribute record borrowed from a message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttr<'a> {
    pub id: u16,
    /// Declared length, attribute header included.
    pub len: usize,
    pub payload: &'a [u8],
}

/// Bounds-checked walk over the attribute region of a message.
///
/// Every record is checked against the bytes that remain before any of its
/// payload is exposed. The walk stops once no more than one attribute
/// header's worth of bytes is left, and after the first error.
#[derive(Debug, Clone)]
pub struct AttrCursor<'a> {
    region: &'a [u8],
    failed: bool,
}

impl<'a> AttrCursor<'a> {
    pub fn new(region: &'a [u8]) -> Self {
        Self {
            region,
            failed: false,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.region.len()
    }
}

impl<'a> Iterator for AttrCursor<'a> {
    type Item = Result<RawAttr<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.region.len() <= NETATTR_SIZ {
            return None;
        }

        let mut hdr = &self.region[..NETATTR_SIZ];
        let len = usize::from(hdr.get_u16());
        let id = hdr.get_u16();

        if len > self.region.len() {
            self.failed = true;
            return Some(Err(DecodeError::Truncated {
                needed: len,
                available: self.region.len(),
            }));
        }

        let payload = self.region.get(NETATTR_SIZ..len).unwrap_or(&[]);
        // The final record may omit its padding.
        let step = nta_align(len.max(NETATTR_SIZ)).min(self.region.len());
        self.region = &self.region[step..];

        Some(Ok(RawAttr { id, len, payload }))
    }
}
