//! Buffered, encoding-aware text persistence for editor documents.
//!
//! The write path mirrors what a desktop editor does on save: the document
//! text is drained in fixed-size character chunks through an encoder into
//! a buffered file handle, off the caller's thread, with the result
//! delivered back exactly once per save.
//!
//! ```no_run
//! use vellum::{PersistRequest, WritePool};
//!
//! # async fn demo() {
//! let pool = WritePool::new(4);
//! let handle = pool.submit(PersistRequest::new(
//!     "fn main() {}\n",
//!     "/tmp/main.rs",
//!     "utf-8",
//! ));
//! match handle.join().await {
//!     Ok(outcome) => println!("wrote {} bytes", outcome.bytes_written),
//!     Err(err) => eprintln!("save failed: {err}"),
//! }
//! # }
//! ```

pub mod document;
pub mod encoding;
pub mod fsutil;
pub mod pool;
pub mod reader;
pub mod types;
pub mod writer;

pub use document::{Document, SaveStarted};
pub use encoding::TextEncoding;
pub use pool::{SaveHandle, SaveListener, WritePool};
pub use reader::{LoadedText, read_to_string};
pub use types::{
    IoStage, PersistError, PersistOutcome, PersistRequest, PersistResult, WriteStrategy,
};
pub use writer::{CHUNK_CHARS, persist_blocking};
