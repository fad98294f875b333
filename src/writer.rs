//! The blocking write path: chunked, encoding-aware, strategy-selectable.
//!
//! Text is drained in fixed-size character chunks through the encoder into
//! a buffered file handle, so a large document never materializes a second
//! full copy of itself in memory on the way to disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use encoding_rs::{Encoder, EncoderResult};
use tempfile::NamedTempFile;

use crate::encoding::{ByteOrder, TextEncoding};
use crate::types::{
    IoStage, PersistError, PersistOutcome, PersistRequest, PersistResult, WriteStrategy,
};

/// Characters drained from the text per write iteration.
pub const CHUNK_CHARS: usize = 16 * 1024;

/// Runs a persist request to completion on the calling thread.
///
/// This is the core the background pool wraps, usable directly when a
/// caller already is on a thread that may block. The sequence is fixed:
/// resolve the encoding first (an unknown label must not create or
/// truncate anything), then open, write chunk by chunk, flush. Zero-length
/// text still opens and flushes, leaving an empty file behind.
pub fn persist_blocking(request: &PersistRequest) -> PersistResult {
    let encoding = TextEncoding::resolve(request.encoding_label())?;
    match request.strategy() {
        WriteStrategy::InPlace => persist_in_place(request, encoding),
        WriteStrategy::AtomicRename => persist_atomic(request, encoding),
    }
}

fn persist_in_place(request: &PersistRequest, encoding: TextEncoding) -> PersistResult {
    let path = request.path();
    let file = File::create(path).map_err(|err| PersistError::io(IoStage::Open, path, err))?;
    let mut out = BufWriter::new(file);
    let outcome = write_text(request.text(), encoding, &mut out, path)?;
    out.flush()
        .map_err(|err| PersistError::io(IoStage::Flush, path, err))?;
    Ok(outcome)
}

fn persist_atomic(request: &PersistRequest, encoding: TextEncoding) -> PersistResult {
    let path = request.path();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|err| PersistError::io(IoStage::Open, path, err))?;
    let outcome = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let outcome = write_text(request.text(), encoding, &mut out, path)?;
        out.flush()
            .map_err(|err| PersistError::io(IoStage::Flush, path, err))?;
        outcome
    };
    tmp.as_file()
        .sync_all()
        .map_err(|err| PersistError::io(IoStage::Flush, path, err))?;
    tmp.persist(path)
        .map_err(|err| PersistError::io(IoStage::Rename, path, err.error))?;
    Ok(outcome)
}

fn write_text(
    text: &str,
    encoding: TextEncoding,
    out: &mut impl Write,
    path: &Path,
) -> PersistResult {
    if let Some(order) = encoding.utf16_order() {
        return write_utf16(text, order, out, path);
    }
    write_encoded(text, encoding, out, path)
}

fn write_encoded(
    text: &str,
    encoding: TextEncoding,
    out: &mut impl Write,
    path: &Path,
) -> PersistResult {
    let mut encoder = encoding.inner().new_encoder();
    let mut buf = Vec::new();
    let mut bytes_written = 0u64;
    let mut replacements = 0u64;
    let mut chunks = CharChunks::new(text, CHUNK_CHARS).peekable();
    while let Some(chunk) = chunks.next() {
        let last = chunks.peek().is_none();
        encode_chunk(
            &mut encoder,
            chunk,
            last,
            out,
            &mut buf,
            &mut bytes_written,
            &mut replacements,
        )
        .map_err(|err| PersistError::io(IoStage::Write, path, err))?;
    }
    Ok(PersistOutcome {
        bytes_written,
        replacements,
    })
}

/// Feeds one chunk through the encoder. Unmappable characters become `?`,
/// the behavior editors inherit from `CharsetEncoder` replacement mode.
fn encode_chunk(
    encoder: &mut Encoder,
    mut src: &str,
    last: bool,
    out: &mut impl Write,
    buf: &mut Vec<u8>,
    bytes_written: &mut u64,
    replacements: &mut u64,
) -> io::Result<()> {
    loop {
        let worst = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        if buf.len() < worst {
            buf.resize(worst, 0);
        }
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(src, buf.as_mut_slice(), last);
        if written > 0 {
            out.write_all(&buf[..written])?;
            *bytes_written += written as u64;
        }
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => {
                out.write_all(b"?")?;
                *bytes_written += 1;
                *replacements += 1;
            }
        }
    }
}

/// UTF-16 is decode-only in the Encoding Standard, so both variants get a
/// direct write path: a byte order mark, then the code units in the
/// requested order. Empty text writes nothing, not even the mark.
fn write_utf16(text: &str, order: ByteOrder, out: &mut impl Write, path: &Path) -> PersistResult {
    if text.is_empty() {
        return Ok(PersistOutcome {
            bytes_written: 0,
            replacements: 0,
        });
    }
    let write_err = |err| PersistError::io(IoStage::Write, path, err);
    let bom: [u8; 2] = match order {
        ByteOrder::Little => [0xFF, 0xFE],
        ByteOrder::Big => [0xFE, 0xFF],
    };
    out.write_all(&bom).map_err(write_err)?;
    let mut bytes_written = 2u64;
    let mut buf = Vec::with_capacity(CHUNK_CHARS * 4);
    for chunk in CharChunks::new(text, CHUNK_CHARS) {
        buf.clear();
        for unit in chunk.encode_utf16() {
            let pair = match order {
                ByteOrder::Little => unit.to_le_bytes(),
                ByteOrder::Big => unit.to_be_bytes(),
            };
            buf.extend_from_slice(&pair);
        }
        out.write_all(&buf).map_err(write_err)?;
        bytes_written += buf.len() as u64;
    }
    Ok(PersistOutcome {
        bytes_written,
        replacements: 0,
    })
}

/// Iterator over `max_chars`-sized chunks of a string, split on character
/// boundaries. Every chunk except the last holds exactly `max_chars`
/// characters; the last holds the remainder.
pub(crate) struct CharChunks<'a> {
    rest: &'a str,
    max_chars: usize,
}

impl<'a> CharChunks<'a> {
    pub(crate) fn new(text: &'a str, max_chars: usize) -> Self {
        debug_assert!(max_chars > 0);
        Self {
            rest: text,
            max_chars,
        }
    }
}

impl<'a> Iterator for CharChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let split = match self.rest.char_indices().nth(self.max_chars) {
            Some((index, _)) => index,
            None => self.rest.len(),
        };
        let (chunk, rest) = self.rest.split_at(split);
        self.rest = rest;
        Some(chunk)
    }
}
