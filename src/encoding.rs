//! Encoding resolution and the wrapper the rest of the crate passes around.
//!
//! Labels follow the WHATWG registry via `encoding_rs`, so `"latin1"`,
//! `"ISO-8859-1"`, and `"windows-1252"` all resolve to the same encoding,
//! and matching is case-insensitive with surrounding whitespace ignored.

use encoding_rs::Encoding;

use crate::types::PersistError;

/// Byte order of a UTF-16 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

/// A resolved character encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    /// Resolves a label like `"utf-8"` or `"Shift_JIS"`.
    ///
    /// The WHATWG `replacement` encoding is rejected along with unknown
    /// labels: it exists to neutralize hostile labels in browsers and can
    /// never round-trip a document.
    pub fn resolve(label: &str) -> Result<Self, PersistError> {
        Encoding::for_label_no_replacement(label.as_bytes())
            .map(Self)
            .ok_or_else(|| PersistError::UnsupportedEncoding {
                label: label.to_owned(),
            })
    }

    /// Identifies an encoding from a byte order mark at the start of
    /// `bytes`. Returns the encoding and the mark's length in bytes.
    #[must_use]
    pub fn sniff_bom(bytes: &[u8]) -> Option<(Self, usize)> {
        Encoding::for_bom(bytes).map(|(encoding, len)| (Self(encoding), len))
    }

    #[must_use]
    pub fn utf8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    /// Canonical name, e.g. `"UTF-8"` or `"windows-1252"`. Canonical names
    /// are themselves labels, so this always resolves back through
    /// [`TextEncoding::resolve`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub(crate) fn inner(&self) -> &'static Encoding {
        self.0
    }

    /// `Some` when this is a UTF-16 variant. The Encoding Standard defines
    /// no UTF-16 encoder, so the writer emits those code units itself.
    pub(crate) fn utf16_order(&self) -> Option<ByteOrder> {
        if self.0 == encoding_rs::UTF_16LE {
            Some(ByteOrder::Little)
        } else if self.0 == encoding_rs::UTF_16BE {
            Some(ByteOrder::Big)
        } else {
            None
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}
