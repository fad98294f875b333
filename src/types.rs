//! Request, outcome, and error types shared across the persistence pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// How the writer lays bytes down on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Open the target with truncation and write into it directly. A crash
    /// mid-write leaves a partial file behind.
    #[default]
    InPlace,
    /// Write to a sibling temp file, fsync, and rename it over the target.
    /// The target never holds a partial document, at the cost of replacing
    /// the inode (hard links and file watchers see a new file).
    AtomicRename,
}

/// Phase of the pipeline an I/O error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    Open,
    Read,
    Write,
    Flush,
    Rename,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Flush => "flush",
            Self::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// Errors produced while loading or persisting a document.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The requested encoding label does not name a known encoding.
    #[error("unsupported encoding label {label:?}")]
    UnsupportedEncoding { label: String },

    /// An I/O operation failed. `stage` records the phase, so callers can
    /// tell "could not open" apart from "disk filled up mid-write".
    #[error("failed to {stage} {}", .path.display())]
    Io {
        stage: IoStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The background task died before reporting a result.
    #[error("background write task terminated before reporting a result")]
    WorkerGone,
}

impl PersistError {
    pub(crate) fn io(stage: IoStage, path: &Path, source: io::Error) -> Self {
        Self::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result delivered for every submitted write, success or failure.
pub type PersistResult = Result<PersistOutcome, PersistError>;

/// What a completed write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Bytes handed to the operating system, including any byte order mark.
    pub bytes_written: u64,
    /// Characters with no representation in the target encoding, written
    /// as `?` instead.
    pub replacements: u64,
}

/// A request to persist one text snapshot to one path.
///
/// The text travels as `Arc<str>`: submitting a save does not copy the
/// document, and the snapshot stays immutable while the background task
/// drains it chunk by chunk.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    text: Arc<str>,
    path: PathBuf,
    encoding_label: String,
    strategy: WriteStrategy,
}

impl PersistRequest {
    /// Builds a request with the default in-place strategy.
    ///
    /// The encoding label is resolved by the writer itself, after the
    /// request has been queued: an unknown label surfaces through the
    /// result channel like any other failure, and no file is created or
    /// truncated for it.
    pub fn new(
        text: impl Into<Arc<str>>,
        path: impl Into<PathBuf>,
        encoding_label: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            path: path.into(),
            encoding_label: encoding_label.into(),
            strategy: WriteStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn encoding_label(&self) -> &str {
        &self.encoding_label
    }

    #[must_use]
    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::{IoStage, PersistError, PersistRequest, WriteStrategy};
    use std::io;
    use std::path::Path;

    #[test]
    fn io_error_message_names_stage_and_path() {
        let err = PersistError::io(
            IoStage::Write,
            Path::new("/tmp/out.txt"),
            io::Error::other("boom"),
        );
        assert_eq!(err.to_string(), "failed to write /tmp/out.txt");
    }

    #[test]
    fn unsupported_encoding_message_quotes_label() {
        let err = PersistError::UnsupportedEncoding {
            label: "utf-9".to_owned(),
        };
        assert_eq!(err.to_string(), "unsupported encoding label \"utf-9\"");
    }

    #[test]
    fn request_defaults_to_in_place() {
        let request = PersistRequest::new("abc", "/tmp/a.txt", "utf-8");
        assert_eq!(request.strategy(), WriteStrategy::InPlace);
        assert_eq!(request.text(), "abc");
        assert_eq!(request.encoding_label(), "utf-8");

        let request = request.with_strategy(WriteStrategy::AtomicRename);
        assert_eq!(request.strategy(), WriteStrategy::AtomicRename);
    }
}
