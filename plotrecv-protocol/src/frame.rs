//! Binary frame format.
//!
//! Frame layout (8 bytes header + payload):
//!
//! ```text
//! +-------------------------+---------------------+
//! |         length          |       payload       |
//! | 8 bytes, u64 big-endian |    length bytes     |
//! +-------------------------+---------------------+
//! ```
//!
//! Frames are sent back-to-back with no delimiters or padding. The payload
//! is opaque; the reference server sends PNG images.

use crate::error::ProtocolError;
use crate::MAX_FRAME_BYTES;
use bytes::{BufMut, BytesMut};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared payload length in bytes.
    pub length: u64,
}

impl FrameHeader {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    /// Decodes a header from its 8 big-endian bytes.
    pub fn decode(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            length: u64::from_be_bytes(*bytes),
        }
    }

    /// Encodes the header into its 8 big-endian bytes.
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        self.length.to_be_bytes()
    }

    /// Checks the declared length against `max` and returns it as a byte count.
    ///
    /// A zero length is rejected as well as anything above `max`.
    pub fn validate(&self, max: u64) -> Result<usize, ProtocolError> {
        if self.length == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if self.length > max {
            return Err(ProtocolError::FrameTooLarge {
                size: self.length,
                max,
            });
        }
        usize::try_from(self.length).map_err(|_| ProtocolError::FrameTooLarge {
            size: self.length,
            max: usize::MAX as u64,
        })
    }
}

/// Encodes a payload into a complete frame (header followed by payload).
pub fn encode_frame(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let header = FrameHeader::new(payload.len() as u64);
    header.validate(MAX_FRAME_BYTES)?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u64(header.length);
    buf.put_slice(payload);
    Ok(buf)
}
