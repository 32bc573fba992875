//! Shared-strings table extraction.
//!
//! The table lives in `xl/sharedStrings.xml`:
//!
//! ```text
//! <sst xmlns="..." count="4" uniqueCount="2">
//!   <si><t>first</t></si>
//!   <si><t xml:space="preserve"> second </t></si>
//! </sst>
//! ```
//!
//! [`extract`] wires a pipeline over the entry's character chunks:
//!
//! 1. [`Tokenizer`] turns chunks into tokens,
//! 2. everything before the `<sst>` root is dropped,
//! 3. the root's `uniqueCount` sizes the [`SharedStrings`] table,
//! 4. [`RecordExtractor`] recognizes `<si><t>..</t></si>` records,
//! 5. each completed record is written to the next table slot.
//!
//! The decoded document is never held in memory as a whole; at most one
//! chunk and one tag or text run are buffered at a time.

mod machine;
mod table;

pub use machine::{GrammarViolation, RecordExtractor, RecordState};
pub use table::SharedStrings;

use std::cell::RefCell;
use std::io::Read;

use crate::chunk::{Chunk, ChunkSource, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, Sink};
use crate::xml::{Token, Tokenizer};

/// Root element of the shared-strings part.
pub const ROOT_TAG: &str = "sst";

/// Attribute holding the number of distinct strings.
pub const COUNT_ATTRIBUTE: &str = "uniqueCount";

/// Tuning for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Characters per chunk read from the entry.
    pub chunk_size: usize,
    /// Capacity of the queue in front of the tokenizer.
    pub chunk_buffer: usize,
    /// Capacity of the queue in front of the record extractor.
    pub token_buffer: usize,
    /// Tolerate whitespace-only text between records.
    pub skip_whitespace: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_buffer: 16,
            token_buffer: 1024,
            skip_whitespace: true,
        }
    }
}

/// Result of extracting one entry.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub strings: SharedStrings,
    /// Set when the records stopped matching the grammar; `strings` then
    /// holds only the records completed before that point.
    pub violation: Option<GrammarViolation>,
}

impl Extraction {
    /// True when the grammar held and every declared slot was filled.
    pub fn is_complete(&self) -> bool {
        self.violation.is_none() && self.strings.is_complete()
    }
}

/// Extract the shared-strings table from an entry's decoded bytes.
pub fn extract<R: Read>(reader: R, options: &ExtractOptions) -> Result<Extraction> {
    let mut source = ChunkSource::new(reader, options.chunk_size);
    extract_chunks(&mut source, options)
}

/// Extract from an already-open chunk source.
///
/// Stops at the first error; the source is left positioned after the chunk
/// that failed.
pub fn extract_chunks<I>(chunks: I, options: &ExtractOptions) -> Result<Extraction>
where
    I: IntoIterator<Item = Result<Chunk>>,
{
    let mut extractor = EntryExtractor::new(options);
    {
        let mut sink = extractor.sink();
        for chunk in chunks {
            sink.consume(chunk?)?;
        }
    }
    extractor.finish()
}

/// Extraction state for one entry, fed by pushing chunks.
///
/// Use this when chunks arrive from somewhere that cannot be wrapped in a
/// [`Read`], such as an entry fetched window by window:
///
/// ```
/// use xlsx_sst::chunk::Chunk;
/// use xlsx_sst::pipeline::Sink;
/// use xlsx_sst::shared_strings::{EntryExtractor, ExtractOptions};
///
/// let mut extractor = EntryExtractor::new(&ExtractOptions::default());
/// {
///     let mut sink = extractor.sink();
///     sink.consume(Chunk::from(r#"<sst uniqueCount="1"><si><t>a"#))?;
///     sink.consume(Chunk::from("</t></si></sst>"))?;
/// }
/// let extraction = extractor.finish()?;
/// assert_eq!(extraction.strings.as_slice(), ["a"]);
/// # Ok::<(), xlsx_sst::Error>(())
/// ```
pub struct EntryExtractor {
    options: ExtractOptions,
    table: RefCell<Option<SharedStrings>>,
    records: RecordExtractor,
}

impl EntryExtractor {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            options: options.clone(),
            table: RefCell::new(None),
            records: RecordExtractor::new(options.skip_whitespace),
        }
    }

    /// Wire the pipeline and return its entry point.
    ///
    /// Call once per entry: every call starts a fresh tokenizer.
    pub fn sink(&mut self) -> Box<dyn Sink<Chunk> + '_> {
        let table = &self.table;
        Pipeline::<Chunk>::new()
            .then(Tokenizer::new(), self.options.chunk_buffer)
            .drop_while(|token: &Token| !is_root(token))
            .head(move |root| {
                let declared = declared_count(&root)?;
                tracing::debug!(declared, "shared strings root found");
                *table.borrow_mut() = Some(SharedStrings::with_declared(declared));
                Ok(())
            })
            .then(&mut self.records, self.options.token_buffer)
            .for_each(move |value| {
                table
                    .borrow_mut()
                    .as_mut()
                    .ok_or(Error::MissingRoot)?
                    .push(value)
                    .map(drop)
            })
    }

    /// The table built so far, with the grammar violation if one occurred.
    pub fn finish(self) -> Result<Extraction> {
        let strings = self.table.into_inner().ok_or(Error::MissingRoot)?;
        tracing::debug!(
            strings = strings.len(),
            declared = strings.declared(),
            tokens = self.records.consumed(),
            "shared strings extracted"
        );
        Ok(Extraction {
            strings,
            violation: self.records.violation().cloned(),
        })
    }
}

fn is_root(token: &Token) -> bool {
    token.is_open(ROOT_TAG) || token.is_single(ROOT_TAG)
}

/// Read `uniqueCount` from the root tag.
fn declared_count(root: &Token) -> Result<usize> {
    let raw = root.attribute(COUNT_ATTRIBUTE);
    raw.and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::MissingOrInvalidCount {
            found: raw.map(str::to_string),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

    const NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

    fn sst(count: &str, records: &[&str]) -> String {
        let body: String = records
            .iter()
            .map(|r| format!("<si><t>{r}</t></si>"))
            .collect();
        format!(
            r#"{PROLOG}
<sst xmlns="{NAMESPACE}" count="9" uniqueCount="{count}">{body}</sst>"#
        )
    }

    fn small_chunks() -> ExtractOptions {
        ExtractOptions {
            chunk_size: 7,
            ..ExtractOptions::default()
        }
    }

    #[test]
    fn extracts_in_document_order() {
        let xml = sst("3", &["a", "b", "c"]);
        let extraction = extract(xml.as_bytes(), &small_chunks()).unwrap();
        assert_eq!(extraction.strings.as_slice(), ["a", "b", "c"]);
        assert!(extraction.is_complete());
    }

    #[test]
    fn unicode_across_chunks() {
        let xml = sst("2", &["Зарегистрированные", "ККТ за июнь"]);
        let extraction = extract(xml.as_bytes(), &small_chunks()).unwrap();
        assert_eq!(extraction.strings.get(0), Some("Зарегистрированные"));
        assert_eq!(&extraction.strings[1], "ККТ за июнь");
    }

    #[test]
    fn more_records_than_declared() {
        let xml = sst("2", &["a", "b", "c"]);
        assert!(matches!(
            extract(xml.as_bytes(), &ExtractOptions::default()),
            Err(Error::CapacityExceeded { declared: 2 })
        ));
    }

    #[test]
    fn missing_or_invalid_count() {
        for root in ["<sst>", r#"<sst uniqueCount="-1">"#, r#"<sst uniqueCount="x">"#] {
            let xml = format!("{root}<si><t>a</t></si></sst>");
            assert!(matches!(
                extract(xml.as_bytes(), &ExtractOptions::default()),
                Err(Error::MissingOrInvalidCount { .. })
            ));
        }
    }

    #[test]
    fn missing_root() {
        let xml = "<si><t>a</t></si>";
        assert!(matches!(
            extract(xml.as_bytes(), &ExtractOptions::default()),
            Err(Error::MissingRoot)
        ));
    }

    #[test]
    fn empty_self_closing_root() {
        let xml = format!(r#"{PROLOG}<sst count="0" uniqueCount="0"/>"#);
        let extraction = extract(xml.as_bytes(), &ExtractOptions::default()).unwrap();
        assert!(extraction.strings.is_empty());
        assert!(extraction.is_complete());
    }

    #[test]
    fn grammar_violation_keeps_earlier_records() {
        let xml = r#"<sst uniqueCount="3"><si><t>a</t></si><si><t>b</si><si><t>c</t></si></sst>"#;
        let extraction = extract(xml.as_bytes(), &ExtractOptions::default()).unwrap();
        assert_eq!(extraction.strings.as_slice(), ["a"]);
        let violation = extraction.violation.unwrap();
        assert_eq!(violation.state, RecordState::TextRead);
        assert_eq!(violation.consumed, 8);
    }

    #[test]
    fn malformed_tag_aborts() {
        let xml = r#"<sst uniqueCount="1"><si broken><t>a</t></si></sst>"#;
        assert!(matches!(
            extract(xml.as_bytes(), &ExtractOptions::default()),
            Err(Error::MalformedTag { .. })
        ));
    }

    #[test]
    fn zero_capacity_buffer_overflows() {
        let options = ExtractOptions {
            chunk_buffer: 0,
            ..ExtractOptions::default()
        };
        assert!(matches!(
            extract(sst("1", &["a"]).as_bytes(), &options),
            Err(Error::BufferOverflow { capacity: 0 })
        ));
    }

    #[test]
    fn pretty_printed_document() {
        let xml = format!(
            "{PROLOG}\n<sst uniqueCount=\"2\">\n\
             \x20 <si>\n    <t>a</t>\n  </si>\n\
             \x20 <si>\n    <t>b</t>\n  </si>\n\
             </sst>\n"
        );
        let extraction = extract(xml.as_bytes(), &small_chunks()).unwrap();
        assert_eq!(extraction.strings.as_slice(), ["a", "b"]);
        assert!(extraction.is_complete());

        let strict = ExtractOptions {
            skip_whitespace: false,
            ..small_chunks()
        };
        let extraction = extract(xml.as_bytes(), &strict).unwrap();
        assert!(extraction.strings.is_empty());
        assert!(extraction.violation.is_some());
    }
}
