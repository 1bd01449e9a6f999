use anyhow::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the per-run encode log inside the output root
pub const ENCODE_LOG_NAME: &str = "hevc-batch.log";

/// Append-only log of encode commands and failure diagnostics
#[derive(Debug, Clone)]
pub struct EncodeLog {
    path: PathBuf,
}

impl EncodeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log living in the output root
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ENCODE_LOG_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a timestamped entry, creating the file if needed
    pub fn write(&self, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{}] {}", timestamp, message)?;
        Ok(())
    }

    /// Like `write`, but a log that cannot be written never affects an encode
    pub fn note(&self, message: &str) {
        if let Err(e) = self.write(message) {
            tracing::debug!(path = %self.path.display(), error = %e, "encode log not writable");
        }
    }
}
