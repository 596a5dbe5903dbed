//! Receiver configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via PLOTRECV_CONFIG)
//! 3. Environment variables
//!
//! The binary applies its positional arguments on top of the result.

use crate::error::ConfigError;
use plotrecv_protocol::{DEFAULT_PORT, MAX_FRAME_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default read chunk size (8 KiB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Minimum read chunk size.
pub const MIN_READ_CHUNK_SIZE: usize = 1;

/// Maximum read chunk size (1 MiB).
pub const MAX_READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Receiver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Server host name or IP literal.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Directory that receives one file per frame.
    pub output_dir: PathBuf,
    /// Largest payload accepted before the session is ended; at most `MAX_FRAME_BYTES`.
    pub max_frame_bytes: u64,
    /// Upper bound on bytes requested per socket read.
    pub read_chunk_size: usize,
    /// File name prefix, e.g. `plot_`.
    pub file_prefix: String,
    /// File extension without the dot.
    pub file_extension: String,
    /// Zero-padded width of the frame index in file names.
    pub index_width: usize,
    /// Connect timeout; the transport default applies when unset.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from("received_plots"),
            max_frame_bytes: MAX_FRAME_BYTES,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            file_prefix: "plot_".to_string(),
            file_extension: "png".to_string(),
            index_width: 4,
            connect_timeout_secs: None,
        }
    }
}

impl ReceiverConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PLOTRECV_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    fn from_yaml(content: &str) -> Result<Self, String> {
        let mut config: ReceiverConfig = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        config.read_chunk_size = clamp_chunk_size(config.read_chunk_size);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PLOTRECV_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var("PLOTRECV_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }

        if let Ok(dir) = std::env::var("PLOTRECV_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Ok(max) = std::env::var("PLOTRECV_MAX_FRAME_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_frame_bytes = n;
            }
        }

        if let Ok(size) = std::env::var("PLOTRECV_READ_CHUNK_SIZE") {
            if let Ok(n) = size.parse() {
                self.read_chunk_size = clamp_chunk_size(n);
            }
        }

        if let Ok(prefix) = std::env::var("PLOTRECV_FILE_PREFIX") {
            self.file_prefix = prefix;
        }

        if let Ok(ext) = std::env::var("PLOTRECV_FILE_EXTENSION") {
            self.file_extension = ext;
        }

        if let Ok(width) = std::env::var("PLOTRECV_INDEX_WIDTH") {
            if let Ok(n) = width.parse() {
                self.index_width = n;
            }
        }

        if let Ok(timeout) = std::env::var("PLOTRECV_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = Some(secs);
            }
        }
    }

    /// Checks values that would make a session impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("host must not be empty".into()));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_frame_bytes must be greater than zero".into(),
            ));
        }
        if self.max_frame_bytes > MAX_FRAME_BYTES {
            return Err(ConfigError::Validation(format!(
                "max_frame_bytes must not exceed {}",
                MAX_FRAME_BYTES
            )));
        }
        if self.connect_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.file_extension.is_empty() {
            return Err(ConfigError::Validation(
                "file_extension must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Returns the `host:port` string used for connecting.
    ///
    /// Bare IPv6 literals are bracketed so the port stays unambiguous.
    pub fn server_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns the connect timeout, if one is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_max_frame_bytes(mut self, max: u64) -> Self {
        self.max_frame_bytes = max;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = clamp_chunk_size(size);
        self
    }

    /// Sets the connect timeout, rounded up to whole seconds.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.connect_timeout_secs = Some(secs);
        self
    }
}

fn clamp_chunk_size(size: usize) -> usize {
    size.clamp(MIN_READ_CHUNK_SIZE, MAX_READ_CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.output_dir, PathBuf::from("received_plots"));
        assert_eq!(config.max_frame_bytes, 50_000_000);
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
        assert!(config.connect_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr_ipv6() {
        let config = ReceiverConfig::new("::1", 9000);
        assert_eq!(config.server_addr(), "[::1]:9000");

        let config = ReceiverConfig::new("[::1]", 9001);
        assert_eq!(config.server_addr(), "[::1]:9001");
    }

    #[test]
    fn test_chunk_size_clamping() {
        let config = ReceiverConfig::default().with_read_chunk_size(0);
        assert_eq!(config.read_chunk_size, MIN_READ_CHUNK_SIZE);

        let config = ReceiverConfig::default().with_read_chunk_size(10 * 1024 * 1024);
        assert_eq!(config.read_chunk_size, MAX_READ_CHUNK_SIZE);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ReceiverConfig::from_yaml("port: 9100\nfile_extension: svg\n").unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.file_extension, "svg");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.file_prefix, "plot_");
    }

    #[test]
    fn test_yaml_chunk_size_is_clamped() {
        let config = ReceiverConfig::from_yaml("read_chunk_size: 0\n").unwrap();
        assert_eq!(config.read_chunk_size, MIN_READ_CHUNK_SIZE);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config =
            ReceiverConfig::new("10.0.0.5", 9200).with_connect_timeout(Duration::from_secs(3));
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = ReceiverConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: plots.local\noutput_dir: /tmp/plots").unwrap();

        let config = ReceiverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "plots.local");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/plots"));
    }

    #[test]
    fn test_from_file_errors() {
        let result = ReceiverConfig::from_file("/nonexistent/plotrecv.yaml");
        assert!(matches!(result, Err(ConfigError::Io(..))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: not-a-number").unwrap();
        let result = ReceiverConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(..))));
    }

    #[test]
    fn test_validate() {
        let config = ReceiverConfig::default().with_host("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = ReceiverConfig::default().with_max_frame_bytes(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ReceiverConfig::default();
        config.file_extension.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ReceiverConfig::default();
        config.connect_timeout_secs = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_max_frame_bytes_cannot_exceed_protocol_limit() {
        let config = ReceiverConfig::default().with_max_frame_bytes(MAX_FRAME_BYTES);
        assert!(config.validate().is_ok());

        let config = ReceiverConfig::default().with_max_frame_bytes(MAX_FRAME_BYTES + 1);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = ReceiverConfig::default().with_max_frame_bytes(u64::MAX);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = ReceiverConfig::from_yaml("max_frame_bytes: 100000000\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_sub_second_connect_timeout_rounds_up() {
        let config = ReceiverConfig::default().with_connect_timeout(Duration::from_millis(500));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(1)));
        assert!(config.validate().is_ok());

        let config = ReceiverConfig::default().with_connect_timeout(Duration::from_millis(2001));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(3)));

        let config = ReceiverConfig::default().with_connect_timeout(Duration::from_secs(2));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(2)));
    }
}
