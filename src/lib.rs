//! # xlsx-sst
//!
//! Streaming extraction of the shared-strings table from XLSX workbooks.
//!
//! The shared-strings part (`xl/sharedStrings.xml`) is decoded, tokenized and
//! matched chunk by chunk, so the XML document is never held in memory as a
//! whole. Workbooks can be read from the local filesystem or from HTTP URLs;
//! for remote files only the archive tail, the central directory and the
//! shared-strings entry are downloaded, using HTTP Range requests.
//!
//! ## Layers
//!
//! - [`chunk`]: incremental UTF-8 decoding into fixed-size character chunks
//! - [`xml`]: character-level tokenizer producing [`xml::Token`]s
//! - [`pipeline`]: composable push-based stages with bounded buffers
//! - [`shared_strings`]: the `<sst>` gate and the record state machine
//! - [`zip`], [`io`], [`walker`]: archive access and per-entry driving
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use xlsx_sst::{LocalFileReader, SharedStringsWalker, WalkOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("book.xlsx"))?);
//!     let walker = SharedStringsWalker::new(reader, WalkOptions::default());
//!
//!     walker
//!         .walk(|entry, extraction| {
//!             for (index, value) in extraction.strings.iter().enumerate() {
//!                 println!("{} {}: {}", entry.file_name, index, value);
//!             }
//!             Ok(())
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chunk;
pub mod cli;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod shared_strings;
pub mod walker;
pub mod xml;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
pub use shared_strings::{EntryExtractor, ExtractOptions, Extraction, SharedStrings};
pub use walker::{SharedStringsWalker, WalkOptions, WalkSummary};
pub use zip::{ZipArchive, ZipFileEntry};
