//! Message encoding, the mirror of [`crate::decode`].
//!
//! The encoders walk the same dispatch tables as the decoders, so the two
//! sides always agree on ids and sizes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::attr::{nta_align, nta_size};
use crate::error::EncodeError;
use crate::header::NetHeader;
use crate::object::{Conntrack, Expectation};
use crate::table::{CtRule, ExpRule, TupleField, CT_TABLE, EXP_TABLE, NAT_SEQ_ADJ_ATTRS};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Largest message the 16-bit header length can describe.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Appends attributes after a header and patches the total length on finish.
#[derive(Debug)]
pub struct MessageBuilder {
    header: NetHeader,
    buf: BytesMut,
    oversized: bool,
}

impl MessageBuilder {
    pub fn new(header: NetHeader) -> Self {
        let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        header.write(&mut buf);
        Self {
            header,
            buf,
            oversized: false,
        }
    }

    pub fn put_u8(&mut self, id: u16, value: u8) -> &mut Self {
        self.put_raw(id, &[value])
    }

    pub fn put_u16(&mut self, id: u16, value: u16) -> &mut Self {
        self.put_raw(id, &value.to_be_bytes())
    }

    pub fn put_u32(&mut self, id: u16, value: u32) -> &mut Self {
        self.put_raw(id, &value.to_be_bytes())
    }

    /// Six 32-bit NAT sequence adjustment fields, each in network order.
    pub fn put_nat_seq_adj(&mut self, id: u16, values: [u32; 6]) -> &mut Self {
        let mut payload = [0u8; 24];
        for (chunk, value) in payload.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_be_bytes());
        }
        self.put_raw(id, &payload)
    }

    /// Append one attribute with an opaque payload, padded to alignment.
    pub fn put_raw(&mut self, id: u16, payload: &[u8]) -> &mut Self {
        let len = nta_size(payload.len());
        let Ok(wire_len) = u16::try_from(len) else {
            self.oversized = true;
            return self;
        };
        self.buf.reserve(nta_align(len));
        self.buf.put_u16(wire_len);
        self.buf.put_u16(id);
        self.buf.put_slice(payload);
        self.buf.put_bytes(0, nta_align(len) - len);
        self
    }

    /// Bytes written so far, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Patch the header length and return the encoded message.
    pub fn finish(mut self) -> Result<Bytes, EncodeError> {
        let size = self.buf.len();
        let len = match u16::try_from(size) {
            Ok(len) if !self.oversized => len,
            _ => {
                return Err(EncodeError::MessageTooLarge {
                    size,
                    max: MAX_MESSAGE_SIZE,
                })
            }
        };
        self.header.len = len;
        self.buf[2..4].copy_from_slice(&len.to_be_bytes());
        Ok(self.buf.freeze())
    }
}

/// Encode every attribute present on `ct` after `header`.
pub fn encode_conntrack(ct: &Conntrack, header: NetHeader) -> Result<Bytes, EncodeError> {
    let mut builder = MessageBuilder::new(header);

    for (id, entry) in (0u16..).zip(CT_TABLE.iter()) {
        match entry.rule {
            CtRule::Reserved => {}
            CtRule::U8(attr) => {
                if let Some(v) = ct.get_u8(attr) {
                    builder.put_u8(id, v);
                }
            }
            CtRule::U16(attr) => {
                if let Some(v) = ct.get_u16(attr) {
                    builder.put_u16(id, v);
                }
            }
            CtRule::U32(attr) => {
                if let Some(v) = ct.get_u32(attr) {
                    builder.put_u32(id, v);
                }
            }
            CtRule::Group(group) => {
                if let Some(data) = ct.group(group) {
                    check_group_size(id, group.size(), data)?;
                    builder.put_raw(id, data);
                }
            }
            CtRule::NatSeqAdj => {
                let values = NAT_SEQ_ADJ_ATTRS.map(|attr| ct.get_u32(attr));
                if values.iter().all(Option::is_some) {
                    builder.put_nat_seq_adj(id, values.map(|v| v.unwrap_or_default()));
                }
            }
        }
    }

    builder.finish()
}

/// Encode the tuples and scalars present on `exp` after `header`.
pub fn encode_expectation(exp: &Expectation, header: NetHeader) -> Result<Bytes, EncodeError> {
    let mut builder = MessageBuilder::new(header);

    for (id, entry) in (0u16..).zip(EXP_TABLE.iter()) {
        match entry.rule {
            ExpRule::Reserved => {}
            ExpRule::Tuple { tuple, field } => {
                let Some(ct) = exp.tuple(tuple) else {
                    continue;
                };
                match field {
                    TupleField::U8(attr) => {
                        if let Some(v) = ct.get_u8(attr) {
                            builder.put_u8(id, v);
                        }
                    }
                    TupleField::Group(group) => {
                        if let Some(data) = ct.group(group) {
                            check_group_size(id, group.size(), data)?;
                            builder.put_raw(id, data);
                        }
                    }
                }
            }
            ExpRule::U32(attr) => {
                if let Some(v) = exp.get_u32(attr) {
                    builder.put_u32(id, v);
                }
            }
        }
    }

    builder.finish()
}

fn check_group_size(id: u16, expected: usize, data: &[u8]) -> Result<(), EncodeError> {
    if data.len() != expected {
        return Err(EncodeError::PayloadSize {
            id,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
