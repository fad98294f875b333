//! Loading text back from disk, honoring byte order marks over declared
//! encodings.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{CoderResult, Decoder};

use crate::encoding::TextEncoding;
use crate::types::{IoStage, PersistError};

/// Bytes pulled from the file per read iteration.
const READ_CHUNK: usize = 16 * 1024;

/// A decoded file along with what was learned while decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedText {
    pub text: String,
    /// The encoding actually used: the byte order mark's when one is
    /// present, otherwise the declared one, otherwise UTF-8.
    pub encoding: TextEncoding,
    /// Whether any byte sequence failed to decode and became U+FFFD.
    pub had_malformed: bool,
}

/// Reads and decodes a file.
///
/// A byte order mark always wins over `declared` and is stripped from the
/// text. Malformed input never fails the load; it decodes to U+FFFD and
/// sets the flag, so a binary file opened by mistake still produces
/// something the caller can inspect and warn about.
pub fn read_to_string(
    path: &Path,
    declared: Option<TextEncoding>,
) -> Result<LoadedText, PersistError> {
    let mut file = File::open(path).map_err(|err| PersistError::io(IoStage::Open, path, err))?;
    let read_err = |err| PersistError::io(IoStage::Read, path, err);

    // Pull enough bytes to cover the longest mark before picking a decoder.
    let mut head = [0u8; 4];
    let mut head_len = 0;
    while head_len < head.len() {
        let n = file.read(&mut head[head_len..]).map_err(read_err)?;
        if n == 0 {
            break;
        }
        head_len += n;
    }
    let reached_eof = head_len < head.len();

    let (encoding, bom_len) = match TextEncoding::sniff_bom(&head[..head_len]) {
        Some((encoding, len)) => (encoding, len),
        None => (declared.unwrap_or_default(), 0),
    };

    let mut decoder = encoding.inner().new_decoder_without_bom_handling();
    let mut text = String::new();
    let mut had_malformed = false;

    decode_append(
        &mut decoder,
        &head[bom_len..head_len],
        &mut text,
        reached_eof,
        &mut had_malformed,
    );
    if !reached_eof {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).map_err(read_err)?;
            let last = n == 0;
            decode_append(&mut decoder, &buf[..n], &mut text, last, &mut had_malformed);
            if last {
                break;
            }
        }
    }

    Ok(LoadedText {
        text,
        encoding,
        had_malformed,
    })
}

fn decode_append(
    decoder: &mut Decoder,
    mut src: &[u8],
    dst: &mut String,
    last: bool,
    had_malformed: &mut bool,
) {
    loop {
        // decode_to_string writes only into spare capacity, so reserve the
        // worst case for this input first.
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 4 + 16);
        dst.reserve(needed);
        let (result, read, malformed) = decoder.decode_to_string(src, dst, last);
        if malformed {
            *had_malformed = true;
        }
        src = &src[read..];
        match result {
            CoderResult::InputEmpty => return,
            CoderResult::OutputFull => {}
        }
    }
}
