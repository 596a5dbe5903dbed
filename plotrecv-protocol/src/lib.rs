//! # plotrecv-protocol
//!
//! Wire format for the plot image stream.
//!
//! This crate provides:
//! - The 8-byte big-endian length header
//! - Frame size bounds and validation
//! - Frame encoding for producing compatible streams

pub mod error;
pub mod frame;

pub use error::ProtocolError;
pub use frame::{encode_frame, FrameHeader, FRAME_HEADER_SIZE};

/// Default port of the plot image server.
pub const DEFAULT_PORT: u16 = 9000;

/// Maximum frame payload size (50 MB).
pub const MAX_FRAME_BYTES: u64 = 50_000_000;
