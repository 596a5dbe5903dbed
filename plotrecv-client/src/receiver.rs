//! Frame receiving.
//!
//! A [`FrameReceiver`] owns one connection and runs a strictly sequential loop:
//! read the 8-byte header, validate it, read exactly that many payload bytes,
//! persist them, repeat. Every read races against the shutdown signal; an
//! interrupt drops the in-flight frame without writing anything.

use crate::config::ReceiverConfig;
use crate::error::ClientError;
use crate::sink::{FileNaming, FrameSink};
use bytes::{Bytes, BytesMut};
use plotrecv_protocol::{FrameHeader, FRAME_HEADER_SIZE, MAX_FRAME_BYTES};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Which part of a frame was being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Header,
    Payload,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePhase::Header => write!(f, "header"),
            FramePhase::Payload => write!(f, "payload"),
        }
    }
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The server closed the connection on a frame boundary.
    EndOfStream,
    /// A header declared a zero or oversized payload.
    InvalidLength { length: u64, max: u64 },
    /// The server closed the connection in the middle of a frame.
    Disconnected {
        phase: FramePhase,
        received: u64,
        expected: u64,
    },
    /// A shutdown was requested.
    Interrupted,
}

impl Termination {
    /// Returns whether the session ended the way a session is expected to end.
    pub fn is_clean(&self) -> bool {
        matches!(self, Termination::EndOfStream | Termination::Interrupted)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::EndOfStream => write!(f, "connection closed by server"),
            Termination::InvalidLength { length, max } => {
                write!(f, "invalid frame length {} (max {})", length, max)
            }
            Termination::Disconnected {
                phase,
                received,
                expected,
            } => write!(
                f,
                "connection closed while receiving {} ({} of {} bytes)",
                phase, received, expected
            ),
            Termination::Interrupted => write!(f, "interrupted by user"),
        }
    }
}

/// Outcome of a completed receive session.
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    /// Number of frames written to disk.
    pub frames_saved: u64,
    /// Files written, in arrival order.
    pub files: Vec<PathBuf>,
    /// Why the session ended.
    pub termination: Termination,
}

/// Result of reading one frame off the stream.
#[derive(Debug)]
enum FrameRead {
    Complete(Bytes),
    EndOfStream,
    InvalidLength {
        length: u64,
    },
    Disconnected {
        phase: FramePhase,
        received: u64,
        expected: u64,
    },
}

/// Requests that a running receiver stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signals the receiver to stop. The frame being read, if any, is discarded.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Receives length-prefixed frames from one connection and writes each to a file.
pub struct FrameReceiver<S = TcpStream> {
    stream: S,
    config: ReceiverConfig,
    peer: String,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl FrameReceiver<TcpStream> {
    /// Connects to the server named by `config`.
    ///
    /// No data is exchanged. Without a configured timeout the transport's own
    /// connect behavior applies; a configured timeout covers name resolution
    /// as well.
    pub async fn connect(config: &ReceiverConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let addr = config.server_addr();
        tracing::debug!("Connecting to {}...", addr);

        let stream = match config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, open(&config.host, &addr))
                .await
                .map_err(|_| {
                    tracing::debug!("Connection timeout");
                    ClientError::ConnectTimeout {
                        addr: addr.clone(),
                        timeout,
                    }
                })??,
            None => open(&config.host, &addr).await?,
        };

        stream.set_nodelay(true).ok();
        tracing::info!("Connected to {}", addr);

        let mut receiver = Self::new(stream, config.clone());
        receiver.peer = addr;
        Ok(receiver)
    }
}

/// Resolves `addr` and connects to the first address that accepts.
async fn open(host: &str, addr: &str) -> Result<TcpStream, ClientError> {
    let addrs = resolve(host, addr).await?;
    TcpStream::connect(&addrs[..]).await.map_err(|source| {
        tracing::debug!("Connection failed: {}", source);
        ClientError::Connect {
            addr: addr.to_string(),
            source,
        }
    })
}

async fn resolve(host: &str, addr: &str) -> Result<Vec<SocketAddr>, ClientError> {
    let malformed = host.chars().any(|c| c.is_whitespace() || c == '/')
        || host.starts_with('[') != host.ends_with(']');
    if malformed {
        return Err(ClientError::InvalidAddress(addr.to_string()));
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| {
            tracing::debug!("Failed to resolve {}: {}", addr, e);
            ClientError::InvalidAddress(addr.to_string())
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ClientError::InvalidAddress(addr.to_string()));
    }
    Ok(addrs)
}

impl<S> FrameReceiver<S>
where
    S: AsyncRead + Unpin,
{
    /// Wraps an already established stream.
    pub fn new(stream: S, config: ReceiverConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let peer = config.server_addr();
        Self {
            stream,
            config,
            peer,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Returns the remote address this receiver reads from.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Returns a handle that stops the receive loop.
    ///
    /// A shutdown requested before [`receive_all`](Self::receive_all) starts is
    /// observed on its first iteration.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Receives frames until the stream ends, a header is invalid, or a
    /// shutdown is requested, writing each complete payload into `output_dir`.
    ///
    /// Consumes the receiver: the connection is closed on every return path.
    /// Transport and file-system failures are returned as errors; everything
    /// else is reported through [`ReceiveReport::termination`].
    pub async fn receive_all(
        mut self,
        output_dir: impl Into<PathBuf>,
    ) -> Result<ReceiveReport, ClientError> {
        let mut sink = FrameSink::create(output_dir, FileNaming::from(&self.config)).await?;
        let max = self.config.max_frame_bytes.min(MAX_FRAME_BYTES);
        let chunk_size = self.config.read_chunk_size;
        let mut files = Vec::new();

        tracing::debug!(
            "[{}] Receiving into {} (max frame {} bytes)",
            self.peer,
            sink.dir().display(),
            max
        );

        let termination = loop {
            let index = sink.frames_written();

            let read = tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    tracing::info!("[{}] Shutdown signal received", self.peer);
                    break Termination::Interrupted;
                }

                result = read_frame(&mut self.stream, max, chunk_size) => match result {
                    Ok(read) => read,
                    Err(e) => {
                        tracing::error!(
                            "[{}] Read error on frame {}: {}",
                            self.peer,
                            index,
                            e
                        );
                        return Err(ClientError::Io(e));
                    }
                },
            };

            match read {
                FrameRead::Complete(payload) => {
                    let path = sink.persist(&payload).await.map_err(|e| {
                        tracing::error!(
                            "[{}] Failed to write {}: {}",
                            self.peer,
                            sink.next_path().display(),
                            e
                        );
                        ClientError::Io(e)
                    })?;
                    tracing::info!("Saved {} ({} bytes)", path.display(), payload.len());
                    files.push(path);
                }
                FrameRead::EndOfStream => {
                    tracing::info!("[{}] Connection closed by server", self.peer);
                    break Termination::EndOfStream;
                }
                FrameRead::InvalidLength { length } => {
                    tracing::warn!(
                        "[{}] Invalid length {} for frame {}, stopping",
                        self.peer,
                        length,
                        index
                    );
                    break Termination::InvalidLength { length, max };
                }
                FrameRead::Disconnected {
                    phase,
                    received,
                    expected,
                } => {
                    tracing::warn!(
                        "[{}] Connection closed while receiving {} of frame {} ({}/{} bytes)",
                        self.peer,
                        phase,
                        index,
                        received,
                        expected
                    );
                    break Termination::Disconnected {
                        phase,
                        received,
                        expected,
                    };
                }
            }
        };

        Ok(ReceiveReport {
            frames_saved: sink.frames_written(),
            files,
            termination,
        })
    }
}

/// Reads one frame, accumulating across short reads.
///
/// A close before any header byte is a clean end of stream; a close after
/// that is a disconnect. The payload is requested in reads of at most
/// `chunk_size` bytes and never past the end of the frame.
async fn read_frame<S>(stream: &mut S, max: u64, chunk_size: usize) -> io::Result<FrameRead>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = stream.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(FrameRead::EndOfStream);
            }
            return Ok(FrameRead::Disconnected {
                phase: FramePhase::Header,
                received: filled as u64,
                expected: FRAME_HEADER_SIZE as u64,
            });
        }
        filled += n;
    }

    let header = FrameHeader::decode(&header);
    let length = match header.validate(max) {
        Ok(length) => length,
        Err(e) => {
            tracing::debug!("Rejected frame header: {}", e);
            return Ok(FrameRead::InvalidLength {
                length: header.length,
            });
        }
    };
    tracing::debug!("Receiving frame of {} bytes", length);

    // Grows with the bytes actually received, not the declared length.
    let mut chunk = vec![0u8; chunk_size.max(1).min(length)];
    let mut payload = BytesMut::with_capacity(chunk.len());
    while payload.len() < length {
        let want = (length - payload.len()).min(chunk.len());
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Ok(FrameRead::Disconnected {
                phase: FramePhase::Payload,
                received: payload.len() as u64,
                expected: length as u64,
            });
        }
        payload.extend_from_slice(&chunk[..n]);
    }

    Ok(FrameRead::Complete(payload.freeze()))
}
