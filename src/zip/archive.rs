use flate2::{Decompress, FlushDecompress, Status};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Default number of compressed bytes fetched per read.
pub const DEFAULT_WINDOW_SIZE: usize = 64 * 1024;

/// Decoded contents of one entry, produced one window at a time.
///
/// At most one window of compressed input and, for DEFLATE entries, one
/// window of inflated output are held at any point.
pub struct EntryStream<R: ReadAt> {
    reader: Arc<R>,
    name: String,
    /// Archive offset of the next compressed byte to fetch.
    next_offset: u64,
    /// Compressed bytes not fetched yet.
    remaining: u64,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    /// `None` for STORED entries.
    inflater: Option<Decompress>,
    output: Vec<u8>,
    /// The last inflate call filled `output`; more may be pending.
    output_full: bool,
    done: bool,
}

impl<R: ReadAt> EntryStream<R> {
    /// Size of the compressed read window in bytes.
    pub fn window_size(&self) -> usize {
        self.input.len()
    }

    /// Next block of decoded bytes, at most one window long.
    ///
    /// Returns `None` once the entry is exhausted.
    pub async fn next_block(&mut self) -> Result<Option<&[u8]>> {
        if self.done {
            return Ok(None);
        }
        if self.inflater.is_none() {
            if !self.refill().await? {
                self.done = true;
                return Ok(None);
            }
            self.input_pos = self.input_len;
            return Ok(Some(&self.input[..self.input_len]));
        }
        Ok(self.inflate().await?.map(|n| &self.output[..n]))
    }

    /// Fetch the next window of compressed bytes; false at the end of the entry.
    async fn refill(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        let n = self.remaining.min(self.input.len() as u64) as usize;
        self.reader
            .read_exact_at(self.next_offset, &mut self.input[..n])
            .await?;
        self.next_offset += n as u64;
        self.remaining -= n as u64;
        self.input_pos = 0;
        self.input_len = n;
        Ok(true)
    }

    /// Inflate until some output is produced; returns its length.
    async fn inflate(&mut self) -> Result<Option<usize>> {
        loop {
            if self.input_pos == self.input_len && !self.output_full && !self.refill().await? {
                bail!("DEFLATE stream of {} is truncated", self.name);
            }
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(None);
            };

            let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
            let status = inflater.decompress(
                &self.input[self.input_pos..self.input_len],
                &mut self.output,
                FlushDecompress::None,
            )?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;

            self.input_pos += consumed;
            self.output_full = produced == self.output.len();
            if status == Status::StreamEnd {
                self.done = true;
            }

            if produced > 0 {
                return Ok(Some(produced));
            }
            if self.done {
                return Ok(None);
            }
            if consumed == 0 && self.input_pos < self.input_len {
                bail!("DEFLATE stream of {} made no progress", self.name);
            }
        }
    }
}

/// Read access to a ZIP archive's entries.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    window_size: usize,
}

impl<R: ReadAt> ZipArchive<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Fetch entries `window_size` compressed bytes at a time.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Open an entry for windowed, decoding reads.
    ///
    /// Only the local header is read here; data is fetched as the stream is
    /// consumed.
    pub async fn open_entry(&self, entry: &ZipFileEntry) -> Result<EntryStream<R>> {
        if entry.is_directory {
            bail!("{} is a directory", entry.file_name);
        }
        let inflater = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(Decompress::new(false)),
            CompressionMethod::Unknown(method) => bail!(
                "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
                method,
                entry.file_name
            ),
        };

        let data_offset = self.parser.data_offset(entry).await?;
        let end = data_offset.checked_add(entry.compressed_size);
        if end.is_none_or(|end| end > self.parser.reader().size()) {
            bail!("Entry {} extends past the end of the archive", entry.file_name);
        }

        tracing::debug!(
            entry = %entry.file_name,
            method = entry.compression_method.as_u16(),
            compressed = entry.compressed_size,
            uncompressed = entry.uncompressed_size,
            window = self.window_size,
            "opened entry"
        );

        Ok(EntryStream {
            reader: self.parser.reader().clone(),
            name: entry.file_name.clone(),
            next_offset: data_offset,
            remaining: entry.compressed_size,
            input: vec![0u8; self.window_size],
            input_pos: 0,
            input_len: 0,
            output: if inflater.is_some() {
                vec![0u8; self.window_size]
            } else {
                Vec::new()
            },
            inflater,
            output_full: false,
            done: false,
        })
    }
}
