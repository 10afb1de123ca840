use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DecodeError, Result};

/// Message header: version/type (1) + flags (1) + length (2) + seq (4) = 8 bytes.
pub const NETHDR_SIZ: usize = 8;

/// Control header carrying an acknowledgement range: header + from (4) + to (4).
pub const NETHDR_ACK_SIZ: usize = 16;

/// Replication protocol version carried in the high nibble of the first byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// Unused flag bit, kept for wire compatibility.
pub const F_UNUSED: u8 = 1 << 0;
/// Peer requests a full resynchronisation.
pub const F_RESYNC: u8 = 1 << 1;
/// Negative acknowledgement of a sequence range.
pub const F_NACK: u8 = 1 << 2;
/// Acknowledgement of a sequence range.
pub const F_ACK: u8 = 1 << 3;
/// Keep-alive.
pub const F_ALIVE: u8 = 1 << 4;
/// Peer (re)started and announces itself.
pub const F_HELLO: u8 = 1 << 5;
/// Answer to a hello.
pub const F_HELLO_BACK: u8 = 1 << 6;

/// Message type carried in the low nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    CtNew = 0,
    CtUpdate = 1,
    CtDelete = 2,
    ExpNew = 3,
    ExpUpdate = 4,
    ExpDelete = 5,
    Control = 10,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::CtNew),
            1 => Some(Self::CtUpdate),
            2 => Some(Self::CtDelete),
            3 => Some(Self::ExpNew),
            4 => Some(Self::ExpUpdate),
            5 => Some(Self::ExpDelete),
            10 => Some(Self::Control),
            _ => None,
        }
    }

    /// True for messages whose TLVs describe a conntrack entry.
    pub fn is_conntrack(self) -> bool {
        matches!(self, Self::CtNew | Self::CtUpdate | Self::CtDelete)
    }

    /// True for messages whose TLVs describe an expectation.
    pub fn is_expectation(self) -> bool {
        matches!(self, Self::ExpNew | Self::ExpUpdate | Self::ExpDelete)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CtNew => "ct-new",
            Self::CtUpdate => "ct-update",
            Self::CtDelete => "ct-delete",
            Self::ExpNew => "exp-new",
            Self::ExpUpdate => "exp-update",
            Self::ExpDelete => "exp-delete",
            Self::Control => "control",
        }
    }
}

/// Fixed-size prefix of every replication message.
///
/// Wire format (all multi-byte fields big-endian):
/// ```text
/// ┌─────────┬──────┬───────┬──────────┬──────────┐
/// │ version │ type │ flags │ len (2B) │ seq (4B) │
/// │ (4 bit) │(4bit)│ (1B)  │          │          │
/// └─────────┴──────┴───────┴──────────┴──────────┘
/// ```
/// `len` covers the header plus every attribute that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetHeader {
    pub version: u8,
    pub msg_type: u8,
    pub flags: u8,
    pub len: u16,
    pub seq: u32,
}

impl NetHeader {
    /// A header for a message with no attributes yet.
    pub fn new(msg_type: MsgType, flags: u8, seq: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type: msg_type as u8,
            flags,
            len: NETHDR_SIZ as u16,
            seq,
        }
    }

    /// Read a header from the front of `buf`, converting from network order.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < NETHDR_SIZ {
            return Err(DecodeError::Truncated {
                needed: NETHDR_SIZ,
                available: buf.len(),
            });
        }
        let mut src = &buf[..NETHDR_SIZ];
        let first = src.get_u8();
        Ok(Self {
            version: first >> 4,
            msg_type: first & 0x0f,
            flags: src.get_u8(),
            len: src.get_u16(),
            seq: src.get_u32(),
        })
    }

    /// Append the header in network order.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(NETHDR_SIZ);
        dst.put_u8((self.version << 4) | (self.msg_type & 0x0f));
        dst.put_u8(self.flags);
        dst.put_u16(self.len);
        dst.put_u32(self.seq);
    }

    pub fn kind(&self) -> Option<MsgType> {
        MsgType::from_u8(self.msg_type)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Total message length declared by the header.
    pub fn total_len(&self) -> usize {
        usize::from(self.len)
    }

    /// Size of the header actually in use: control messages carrying an
    /// acknowledgement range are longer.
    pub fn header_size(&self) -> usize {
        if self.msg_type == MsgType::Control as u8 && self.flags & (F_ACK | F_NACK) != 0 {
            NETHDR_ACK_SIZ
        } else {
            NETHDR_SIZ
        }
    }
}

/// Sequence range carried by ack/nack control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    pub from: u32,
    pub to: u32,
}

impl AckRange {
    /// Read the range that follows the header of an ack/nack message.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < NETHDR_ACK_SIZ {
            return Err(DecodeError::Truncated {
                needed: NETHDR_ACK_SIZ,
                available: buf.len(),
            });
        }
        let mut src = &buf[NETHDR_SIZ..NETHDR_ACK_SIZ];
        Ok(Self {
            from: src.get_u32(),
            to: src.get_u32(),
        })
    }

    /// Append the range after an already written header.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.put_u32(self.from);
        dst.put_u32(self.to);
    }
}
