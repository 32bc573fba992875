//! Error types for the streaming extraction core.
//!
//! Everything below the archive layer reports failures through [`Error`].
//! The archive, network and CLI layers wrap these in `anyhow::Error`.

/// Failures that abort extraction of the current archive entry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A tag's raw text could not be split into a name and `key="value"` pairs.
    #[error("Malformed tag <{tag}>: {reason}")]
    MalformedTag { tag: String, reason: &'static str },

    /// The `<sst>` root has no parseable `uniqueCount` attribute.
    #[error("Shared strings root has no valid uniqueCount (found {found:?})")]
    MissingOrInvalidCount { found: Option<String> },

    /// More records completed than the root declared.
    #[error("More shared strings than the declared uniqueCount of {declared}")]
    CapacityExceeded { declared: usize },

    /// A bounded stage queue was asked to hold more than its capacity.
    #[error("Stage buffer overflow (capacity {capacity})")]
    BufferOverflow { capacity: usize },

    /// The token stream ended without an `<sst>` root element.
    #[error("No <sst> root element found")]
    MissingRoot,

    /// The entry's bytes are not valid UTF-8.
    #[error("Invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(tag: &str, reason: &'static str) -> Self {
        Error::MalformedTag {
            tag: tag.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
