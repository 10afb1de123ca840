//! Send-side staging: the packing buffer of buffered channels and the
//! retry queue of channels that report errors.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// Default number of messages kept for retry.
pub const ERRORQ_MAX_LEN: usize = 128;

/// Packs several messages into one datagram of at most `capacity` bytes.
#[derive(Debug)]
pub(crate) struct SendBuffer {
    data: BytesMut,
    capacity: usize,
}

impl SendBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `len` more bytes fit without flushing first.
    pub(crate) fn fits(&self, len: usize) -> bool {
        self.data.len() + len <= self.capacity
    }

    pub(crate) fn push(&mut self, msg: &[u8]) {
        self.data.extend_from_slice(msg);
    }

    /// Take the packed bytes, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}

/// Bounded FIFO of payloads whose send failed.
#[derive(Debug)]
pub(crate) struct ErrorQueue {
    items: VecDeque<Bytes>,
    max_len: usize,
    dropped: u64,
}

impl ErrorQueue {
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_len,
            dropped: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Payloads discarded because the queue was full.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Append a payload; returns true if the oldest one was discarded.
    pub(crate) fn push(&mut self, payload: Bytes) -> bool {
        let overflow = self.items.len() >= self.max_len;
        if overflow {
            self.items.pop_front();
            self.dropped += 1;
        }
        self.items.push_back(payload);
        overflow
    }

    pub(crate) fn front(&self) -> Option<&Bytes> {
        self.items.front()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Bytes> {
        self.items.pop_front()
    }
}
