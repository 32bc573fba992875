//! Command-line front end for xlsx-sst.
//!
//! Lists or extracts the shared-strings tables of a workbook given as a local
//! path or an HTTP URL.

use anyhow::{Result, bail};
use clap::Parser;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use xlsx_sst::{
    Cli, Extraction, HttpRangeReader, LocalFileReader, ReadAt, SharedStringsWalker, ZipFileEntry,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.is_http_url() {
        let reader = Arc::new(HttpRangeReader::new(cli.file.clone()).await?);
        let result = process_workbook(reader.clone(), &cli).await;

        if !cli.quiet {
            eprintln!("Total bytes transferred: {}", format_size(reader.transferred_bytes()));
        }
        result
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.file))?);
        process_workbook(reader, &cli).await
    }
}

/// List or extract the workbook's shared-strings entries.
async fn process_workbook<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let walker = SharedStringsWalker::new(reader, cli.walk_options());

    if cli.list {
        for entry in walker.entries().await? {
            println!(
                "{:>10}  {:>10}  {}",
                entry.uncompressed_size, entry.compressed_size, entry.file_name
            );
        }
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    let summary = walker
        .walk(|entry, extraction| {
            if cli.json {
                print_json(&mut stdout, entry, &extraction)
            } else {
                print_lines(&mut stdout, &extraction)
            }
        })
        .await?;
    stdout.flush()?;

    if !cli.quiet {
        eprintln!(
            "{} entries extracted, {} failed",
            summary.extracted,
            summary.failed.len()
        );
    }

    match summary.failed.as_slice() {
        [] => Ok(()),
        [only] => bail!("{}: {:#}", only.entry, only.error),
        failed => bail!("{} entries failed", failed.len()),
    }
}

/// One `index<TAB>value` line per string; tabs and newlines are escaped.
fn print_lines(out: &mut impl Write, extraction: &Extraction) -> Result<()> {
    for (index, value) in extraction.strings.iter().enumerate() {
        let value = value
            .replace('\\', "\\\\")
            .replace('\t', "\\t")
            .replace('\n', "\\n");
        writeln!(out, "{index}\t{value}")?;
    }
    Ok(())
}

/// One JSON object per entry: `{"entry": .., "complete": .., "strings": {"0": ..}}`.
fn print_json(out: &mut impl Write, entry: &ZipFileEntry, extraction: &Extraction) -> Result<()> {
    let strings: Map<String, Value> = extraction
        .strings
        .iter()
        .enumerate()
        .map(|(index, value)| (index.to_string(), Value::from(value)))
        .collect();

    let mut object = Map::new();
    object.insert("entry".into(), Value::from(entry.file_name.as_str()));
    object.insert("declared".into(), Value::from(extraction.strings.declared()));
    object.insert("complete".into(), Value::from(extraction.is_complete()));
    if let Some(violation) = &extraction.violation {
        object.insert("violation".into(), Value::from(violation.to_string()));
    }
    object.insert("strings".into(), Value::Object(strings));

    serde_json::to_writer(&mut *out, &Value::Object(object))?;
    writeln!(out)?;
    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
