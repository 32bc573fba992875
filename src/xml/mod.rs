//! Minimal incremental markup tokenizer.
//!
//! Only what the shared-strings part needs is supported: elements with
//! double-quoted attributes, self-closing elements, character data and the
//! `<?xml ...?>` declaration. Entities are passed through undecoded;
//! comments, CDATA, DTDs and namespaces are not understood.

mod token;
mod tokenizer;

pub use token::{Attributes, Token};
pub use tokenizer::Tokenizer;
