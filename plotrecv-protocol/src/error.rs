//! Protocol error types.

use thiserror::Error;

/// Errors raised when a frame header violates the wire format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty frame: header declares zero payload bytes")]
    EmptyFrame,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },
}
