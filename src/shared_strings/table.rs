use std::ops::Index;

use crate::error::{Error, Result};

/// Upper bound on slots reserved up front for a declared count.
const MAX_PREALLOC: usize = 1 << 16;

/// Shared-strings table sized by the root's `uniqueCount`.
///
/// Strings are stored in the order their records completed. Pushing more
/// strings than were declared fails with [`Error::CapacityExceeded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedStrings {
    values: Vec<String>,
    declared: usize,
}

impl SharedStrings {
    pub fn with_declared(declared: usize) -> Self {
        Self {
            values: Vec::with_capacity(declared.min(MAX_PREALLOC)),
            declared,
        }
    }

    /// Store the next string and return its index.
    pub fn push(&mut self, value: String) -> Result<usize> {
        if self.values.len() >= self.declared {
            return Err(Error::CapacityExceeded {
                declared: self.declared,
            });
        }
        self.values.push(value);
        Ok(self.values.len() - 1)
    }

    /// Count taken from `uniqueCount`.
    pub fn declared(&self) -> usize {
        self.declared
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every declared slot was filled.
    pub fn is_complete(&self) -> bool {
        self.values.len() == self.declared
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<String> {
        self.values
    }
}

impl Index<usize> for SharedStrings {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.values[index]
    }
}
