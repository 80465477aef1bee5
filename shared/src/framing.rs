//! Message boundaries for stream transports.
//!
//! Packets carry no length prefix of their own, so a stream connection wraps
//! each one in a two-byte big-endian length header. The receiving side sees
//! exactly the bytes that were sent, one message at a time.

use thiserror::Error;

pub const FRAME_HEADER_LEN: usize = 2;
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the {max} byte frame limit", max = MAX_FRAME_PAYLOAD)]
    TooLarge(usize),
}

pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Accumulates raw stream bytes and splits them back into messages.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(1024),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Direct access for `AsyncReadExt::read_buf`, which appends in place.
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.pending.len() < FRAME_HEADER_LEN {
            return None;
        }

        let len = u16::from_be_bytes([self.pending[0], self.pending[1]]) as usize;
        let end = FRAME_HEADER_LEN + len;
        if self.pending.len() < end {
            return None;
        }

        let payload = self.pending[FRAME_HEADER_LEN..end].to_vec();
        self.pending.drain(..end);
        Some(payload)
    }
}
