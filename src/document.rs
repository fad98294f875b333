//! An editor document: its path, encoding, and a fingerprint of the last
//! saved text, so redundant saves can be skipped without keeping a second
//! copy of the buffer around.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::encoding::TextEncoding;
use crate::pool::{SaveHandle, WritePool};
use crate::reader::{self, LoadedText};
use crate::types::{PersistError, PersistRequest, WriteStrategy};

/// Outcome of asking a document to save.
#[derive(Debug)]
pub enum SaveStarted {
    /// The text matches the last saved fingerprint; nothing was queued.
    Unchanged,
    /// A write was queued; the handle reports how it went.
    Started(SaveHandle),
}

impl SaveStarted {
    #[must_use]
    pub fn into_handle(self) -> Option<SaveHandle> {
        match self {
            Self::Unchanged => None,
            Self::Started(handle) => Some(handle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    digest: [u8; 32],
    char_len: usize,
}

impl Fingerprint {
    fn of(text: &str) -> Self {
        Self {
            digest: Sha256::digest(text.as_bytes()).into(),
            char_len: text.chars().count(),
        }
    }
}

/// A document bound to a path and encoding.
///
/// The document does not own the text. Callers hand a snapshot to
/// [`Document::save`] and record the result themselves with
/// [`Document::mark_saved`] once the handle reports success, keeping state
/// updates in the caller's task instead of the writer thread.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    encoding: TextEncoding,
    strategy: WriteStrategy,
    saved: Option<Fingerprint>,
}

impl Document {
    /// A document that has never been written to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, encoding: TextEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
            strategy: WriteStrategy::default(),
            saved: None,
        }
    }

    /// Opens `path`, decoding with `declared` when no byte order mark
    /// overrides it. The returned document treats the loaded text as its
    /// saved state.
    pub fn load(
        path: impl Into<PathBuf>,
        declared: Option<&str>,
    ) -> Result<(Self, LoadedText), PersistError> {
        let path = path.into();
        let declared = declared.map(TextEncoding::resolve).transpose()?;
        let loaded = reader::read_to_string(&path, declared)?;
        tracing::debug!(
            path = %path.display(),
            encoding = loaded.encoding.name(),
            chars = loaded.text.chars().count(),
            "document loaded"
        );
        let document = Self {
            path,
            encoding: loaded.encoding,
            strategy: WriteStrategy::default(),
            saved: Some(Fingerprint::of(&loaded.text)),
        };
        Ok((document, loaded))
    }

    /// Re-reads the file, optionally forcing a different encoding, the way
    /// an editor's "reopen with encoding" menu does. Unsaved edits are the
    /// caller's to discard; this only refreshes the document's own state.
    pub fn reload(&mut self, encoding_label: Option<&str>) -> Result<LoadedText, PersistError> {
        let declared = match encoding_label {
            Some(label) => TextEncoding::resolve(label)?,
            None => self.encoding,
        };
        let loaded = reader::read_to_string(&self.path, Some(declared))?;
        self.encoding = loaded.encoding;
        self.saved = Some(Fingerprint::of(&loaded.text));
        Ok(loaded)
    }

    /// Whether `text` differs from the last loaded or saved state. A
    /// document that has never touched its path reports modified.
    #[must_use]
    pub fn is_modified(&self, text: &str) -> bool {
        match &self.saved {
            None => true,
            Some(saved) => {
                // Length first: cheaper than hashing when an edit changed it.
                if text.chars().count() != saved.char_len {
                    return true;
                }
                let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
                digest != saved.digest
            }
        }
    }

    /// Records `text` as the on-disk content. Call after a save completes
    /// successfully.
    pub fn mark_saved(&mut self, text: &str) {
        self.saved = Some(Fingerprint::of(text));
    }

    /// Queues a save through `pool` unless `text` matches the saved
    /// fingerprint.
    ///
    /// The fingerprint is not updated here: the write has merely been
    /// queued. Call [`Document::mark_saved`] once the handle reports
    /// success.
    #[must_use]
    pub fn save(&self, pool: &WritePool, text: impl Into<Arc<str>>) -> SaveStarted {
        let text: Arc<str> = text.into();
        if !self.is_modified(&text) {
            tracing::debug!(path = %self.path.display(), "text unchanged, save skipped");
            return SaveStarted::Unchanged;
        }
        SaveStarted::Started(pool.submit(self.request(text)))
    }

    /// Retargets the document for save-as. With `encoding_label` set, the
    /// write encoding changes too. The fingerprint clears because nothing
    /// has been written at the new path yet, so the next [`Document::save`]
    /// always queues a write.
    pub fn save_to(
        &mut self,
        path: impl Into<PathBuf>,
        encoding_label: Option<&str>,
    ) -> Result<(), PersistError> {
        if let Some(label) = encoding_label {
            self.encoding = TextEncoding::resolve(label)?;
        }
        self.path = path.into();
        self.saved = None;
        Ok(())
    }

    fn request(&self, text: Arc<str>) -> PersistRequest {
        PersistRequest::new(text, self.path.clone(), self.encoding.name())
            .with_strategy(self.strategy)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    #[must_use]
    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: WriteStrategy) {
        self.strategy = strategy;
    }

    /// File name portion of the path, for window and tab titles.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}
