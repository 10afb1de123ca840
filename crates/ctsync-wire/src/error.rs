/// Errors that can occur while decoding a replication message.
///
/// Every variant aborts the whole message: callers drop the buffer (or the
/// stream connection) rather than accept partial state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A length field claims more bytes than are available.
    #[error("truncated message: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The header length is smaller than the header itself.
    #[error("invalid message length {len} (header is {min} bytes)")]
    InvalidLength { len: usize, min: usize },

    /// The attribute id is beyond the dispatch table.
    #[error("unknown attribute {id} (table holds {max} entries)")]
    UnknownAttribute { id: u16, max: usize },

    /// The attribute length differs from the size the table declares.
    #[error("attribute {id} has length {actual}, expected {expected}")]
    SizeMismatch {
        id: u16,
        expected: usize,
        actual: usize,
    },

    /// The attribute length does not even cover the attribute header.
    #[error("attribute {id} length {len} is shorter than its header")]
    AttributeTooShort { id: u16, len: usize },

    /// A scratch object could not be constructed.
    #[error("failed to allocate {object} object")]
    AllocationFailure { object: &'static str },
}

/// Errors that can occur while encoding a replication message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The encoded message does not fit the 16-bit length field.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A group payload does not match the group's fixed layout.
    #[error("attribute {id} payload is {actual} bytes, expected {expected}")]
    PayloadSize {
        id: u16,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
