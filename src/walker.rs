//! Drives one extraction pipeline per shared-strings entry of a workbook.

use std::sync::Arc;

use anyhow::Result;

use crate::chunk::Utf8Decoder;
use crate::io::ReadAt;
use crate::pipeline::Sink;
use crate::shared_strings::{EntryExtractor, ExtractOptions, Extraction};
use crate::zip::{DEFAULT_WINDOW_SIZE, ZipArchive, ZipFileEntry};

/// Name prefix of shared-strings parts inside a workbook.
pub const SHARED_STRINGS_PREFIX: &str = "xl/sharedStrings";

/// Which entries to visit and how to extract them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    pub prefix: String,
    /// Compressed bytes fetched per read of an entry.
    pub window_size: usize,
    pub extract: ExtractOptions,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            prefix: SHARED_STRINGS_PREFIX.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            extract: ExtractOptions::default(),
        }
    }
}

impl WalkOptions {
    pub fn matches(&self, entry: &ZipFileEntry) -> bool {
        !entry.is_directory
            && entry.file_name.starts_with(&self.prefix)
            && entry.file_name.ends_with(".xml")
    }
}

/// An entry whose extraction was abandoned.
#[derive(Debug)]
pub struct EntryFailure {
    pub entry: String,
    pub error: anyhow::Error,
}

/// Outcome of a walk over one workbook.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Entries whose table reached the sink.
    pub extracted: usize,
    pub failed: Vec<EntryFailure>,
}

/// Walks a workbook archive and extracts every matching entry.
pub struct SharedStringsWalker<R: ReadAt> {
    archive: ZipArchive<R>,
    options: WalkOptions,
}

impl<R: ReadAt> SharedStringsWalker<R> {
    pub fn new(reader: Arc<R>, options: WalkOptions) -> Self {
        Self {
            archive: ZipArchive::new(reader).with_window_size(options.window_size),
            options,
        }
    }

    /// Entries the walk would visit, in archive order.
    pub async fn entries(&self) -> Result<Vec<ZipFileEntry>> {
        let mut entries = self.archive.list_files().await?;
        entries.retain(|e| self.options.matches(e));
        Ok(entries)
    }

    /// Extract every matching entry and hand each table to `sink`.
    ///
    /// A failing entry is logged and recorded in the summary, then the walk
    /// moves on. Errors from listing the archive or from `sink` end the walk.
    pub async fn walk<F>(&self, mut sink: F) -> Result<WalkSummary>
    where
        F: FnMut(&ZipFileEntry, Extraction) -> Result<()>,
    {
        let mut summary = WalkSummary::default();

        for entry in self.entries().await? {
            match self.extract_entry(&entry).await {
                Ok(extraction) => {
                    if let Some(violation) = &extraction.violation {
                        tracing::warn!(
                            entry = %entry.file_name,
                            %violation,
                            "shared strings truncated"
                        );
                    }
                    sink(&entry, extraction)?;
                    summary.extracted += 1;
                }
                Err(error) => {
                    tracing::error!(entry = %entry.file_name, "{error:#}");
                    summary.failed.push(EntryFailure {
                        entry: entry.file_name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Extract a single entry.
    ///
    /// The entry is fetched and decoded one window at a time and each window
    /// is pushed through the pipeline before the next is read. The stream and
    /// decoder are dropped before this returns.
    pub async fn extract_entry(&self, entry: &ZipFileEntry) -> Result<Extraction> {
        let mut stream = self.archive.open_entry(entry).await?;
        tracing::debug!(entry = %entry.file_name, "extracting shared strings");

        let mut decoder = Utf8Decoder::new(self.options.extract.chunk_size);
        let mut extractor = EntryExtractor::new(&self.options.extract);
        let mut chunks = Vec::new();
        {
            let mut sink = extractor.sink();
            while let Some(block) = stream.next_block().await? {
                decoder.decode(block, &mut chunks)?;
                for chunk in chunks.drain(..) {
                    sink.consume(chunk)?;
                }
            }
            decoder.finish(&mut chunks)?;
            for chunk in chunks.drain(..) {
                sink.consume(chunk)?;
            }
        }
        Ok(extractor.finish()?)
    }
}
