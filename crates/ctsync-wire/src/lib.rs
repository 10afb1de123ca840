//! Wire format for conntrack state replication.
//!
//! Every message is an 8-byte [`NetHeader`] followed by a sequence of
//! type-length-value attributes:
//! - conntrack messages (new/update/delete) carry [`nta`] attributes
//! - expectation messages carry [`nta_exp`] attributes
//!
//! Decoding is table driven and validates every length against the bytes
//! actually held before touching a payload.

pub mod attr;
pub mod build;
pub mod decode;
pub mod error;
pub mod header;
pub mod object;
pub mod stream;
pub mod table;

pub use attr::{nta, nta_exp, AttrCursor, RawAttr, NETATTR_SIZ};
pub use build::{encode_conntrack, encode_expectation, MessageBuilder, MAX_MESSAGE_SIZE};
pub use decode::{decode_conntrack, decode_conntrack_as, decode_expectation, decode_expectation_as};
pub use error::{DecodeError, EncodeError, Result};
pub use header::{AckRange, MsgType, NetHeader, NETHDR_ACK_SIZ, NETHDR_SIZ, PROTOCOL_VERSION};
pub use object::{
    AttrValue, Conntrack, ConntrackObject, CtAttr, CtGroup, ExpAttr, ExpTuple, Expectation,
    ExpectationObject,
};
pub use stream::{split_messages, MessageAssembler, SplitMessages};
