//! ticketdesk-text
//!
//! In-memory BM25 lexical index backed by Tantivy RAM indexes. See `index`
//! for the snapshot publication model and `tantivy_utils` for the schema and
//! the tokenizer shared by documents and queries.

pub mod tantivy_utils;
pub mod index;

pub use index::{LexicalIndex, LexicalSnapshot};
pub use tantivy_utils::tokenize;
