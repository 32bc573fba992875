use clap::Parser;

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::shared_strings::ExtractOptions;
use crate::walker::{SHARED_STRINGS_PREFIX, WalkOptions};
use crate::zip::DEFAULT_WINDOW_SIZE;

#[derive(Parser, Debug)]
#[command(name = "xlsx-sst")]
#[command(version)]
#[command(about = "Stream the shared-strings table out of XLSX workbooks", long_about = None)]
#[command(after_help = "Examples:\n  \
  xlsx-sst report.xlsx                        print index and value of every shared string\n  \
  xlsx-sst --json report.xlsx | jq .          one JSON object per shared-strings entry\n  \
  xlsx-sst -l https://example.com/book.xlsx   list shared-strings entries of a remote workbook\n\n\
  Set RUST_LOG=debug for diagnostics.")]
pub struct Cli {
    /// Workbook path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List matching entries instead of extracting them
    #[arg(short = 'l')]
    pub list: bool,

    /// Entry name prefix to extract
    #[arg(long, value_name = "PREFIX", default_value = SHARED_STRINGS_PREFIX)]
    pub prefix: String,

    /// Characters read per chunk
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Compressed bytes fetched per read of an entry
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Capacity of the token buffer in front of the record extractor
    #[arg(long, value_name = "N", default_value_t = ExtractOptions::default().token_buffer)]
    pub buffer: usize,

    /// Treat whitespace between records as a grammar violation
    #[arg(long)]
    pub strict_whitespace: bool,

    /// Print each table as a JSON object keyed by index
    #[arg(long)]
    pub json: bool,

    /// Quiet mode, no summary on stderr
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        crate::io::is_http_url(&self.file)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            prefix: self.prefix.clone(),
            window_size: self.window_size,
            extract: ExtractOptions {
                chunk_size: self.chunk_size,
                token_buffer: self.buffer,
                skip_whitespace: !self.strict_whitespace,
                ..ExtractOptions::default()
            },
        }
    }
}
