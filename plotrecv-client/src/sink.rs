//! Output directory and per-frame file persistence.

use crate::config::ReceiverConfig;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Suffix of the temporary file a payload is written to before it is renamed.
const PARTIAL_SUFFIX: &str = "part";

/// How output files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNaming {
    pub prefix: String,
    pub extension: String,
    pub width: usize,
}

impl FileNaming {
    /// Returns the file name for the frame at `index`, e.g. `plot_0007.png`.
    pub fn file_name(&self, index: u64) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = self.width
        )
    }
}

impl Default for FileNaming {
    fn default() -> Self {
        Self::from(&ReceiverConfig::default())
    }
}

impl From<&ReceiverConfig> for FileNaming {
    fn from(config: &ReceiverConfig) -> Self {
        Self {
            prefix: config.file_prefix.clone(),
            extension: config.file_extension.clone(),
            width: config.index_width,
        }
    }
}

/// Writes received payloads into an output directory, one file per frame.
///
/// The sink owns the frame counter: it only advances after a file has been
/// written completely, so file names stay gapless.
#[derive(Debug)]
pub struct FrameSink {
    dir: PathBuf,
    naming: FileNaming,
    next_index: u64,
}

impl FrameSink {
    /// Creates the output directory (and any missing parents) and returns a sink
    /// starting at index 0.
    pub async fn create(dir: impl Into<PathBuf>, naming: FileNaming) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::debug!("Output directory ready: {}", dir.display());
        Ok(Self {
            dir,
            naming,
            next_index: 0,
        })
    }

    /// Returns the output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of frames persisted so far.
    pub fn frames_written(&self) -> u64 {
        self.next_index
    }

    /// Returns the path the next persisted frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(self.naming.file_name(self.next_index))
    }

    /// Writes `payload` verbatim to the next file and advances the counter.
    ///
    /// The payload goes to a temporary file first and is renamed into place, so
    /// the final name never holds partial content. On failure the counter is
    /// left unchanged.
    pub async fn persist(&mut self, payload: &[u8]) -> io::Result<PathBuf> {
        let path = self.next_path();
        let partial = partial_path(&path);

        if let Err(e) = write_file(&partial, payload).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        self.next_index += 1;
        Ok(path)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn write_file(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(payload).await?;
    file.flush().await?;
    Ok(())
}
