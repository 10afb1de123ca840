//! Splitting datagrams and reassembling streams into whole messages.

use bytes::{Bytes, BytesMut};

use crate::error::{DecodeError, Result};
use crate::header::{NetHeader, NETHDR_SIZ};

/// Iterate the complete messages packed back to back in one datagram.
///
/// A trailing partial message ends the iteration silently. A header whose
/// length is below the header size yields one error and ends it.
pub fn split_messages(datagram: &[u8]) -> SplitMessages<'_> {
    SplitMessages {
        rest: datagram,
        failed: false,
    }
}

#[derive(Debug, Clone)]
pub struct SplitMessages<'a> {
    rest: &'a [u8],
    failed: bool,
}

impl<'a> SplitMessages<'a> {
    /// Bytes left over after the messages yielded so far.
    pub fn remainder(&self) -> &'a [u8] {
        self.rest
    }
}

impl<'a> Iterator for SplitMessages<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let total = match message_len(self.rest) {
            Ok(Some(total)) => total,
            Ok(None) => return None,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        let (msg, rest) = self.rest.split_at(total);
        self.rest = rest;
        Some(Ok(msg))
    }
}

/// Accumulates bytes from a stream transport and yields whole messages.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buf: BytesMut,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes held that do not yet form a complete message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete message.
    ///
    /// Returns `Ok(None)` if more bytes are needed. An error means the stream
    /// has lost message boundaries and the connection should be dropped.
    pub fn next_message(&mut self) -> Result<Option<Bytes>> {
        match message_len(&self.buf)? {
            Some(total) => Ok(Some(self.buf.split_to(total).freeze())),
            None => Ok(None),
        }
    }
}

/// Length of the complete message at the front of `buf`, if there is one.
fn message_len(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < NETHDR_SIZ {
        return Ok(None);
    }
    let total = NetHeader::parse(buf)?.total_len();
    if total < NETHDR_SIZ {
        return Err(DecodeError::InvalidLength {
            len: total,
            min: NETHDR_SIZ,
        });
    }
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some(total))
}
