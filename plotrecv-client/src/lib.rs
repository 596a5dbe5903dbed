//! # plotrecv-client
//!
//! Client library for receiving plot images from a streaming server.
//!
//! This crate provides:
//! - A TCP frame receiver with bounded frame sizes
//! - Sequential, gapless persistence of each frame to its own file
//! - Configuration from defaults, a YAML file and environment variables
//! - Graceful shutdown that never leaves a partial file behind

pub mod config;
pub mod error;
pub mod receiver;
pub mod sink;

pub use config::ReceiverConfig;
pub use error::{ClientError, ConfigError};
pub use receiver::{FramePhase, FrameReceiver, ReceiveReport, ShutdownHandle, Termination};
pub use sink::{FileNaming, FrameSink};
