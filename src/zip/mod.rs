//! ZIP archive access for workbook containers.
//!
//! - [`structures`]: fixed records (EOCD, ZIP64 records, file headers)
//! - [`parser`]: locating and parsing those records through [`ReadAt`](crate::io::ReadAt)
//! - [`archive`]: listing entries and streaming their decoded data in windows
//!
//! Supported: standard and ZIP64 archives, STORED and DEFLATE entries.
//! Not supported: encryption, multi-disk archives, other compression methods.

mod archive;
mod parser;
mod structures;

pub use archive::{DEFAULT_WINDOW_SIZE, EntryStream, ZipArchive};
pub use parser::ZipParser;
pub use structures::*;
