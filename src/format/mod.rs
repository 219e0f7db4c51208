//! On-disk record formats
//!
//! Every binary integer and float is stored big-endian.

pub mod document;
pub mod index_meta;
pub mod meta;
pub mod posting;
pub mod vocabulary;

pub use document::Document;
pub use index_meta::IndexMeta;
pub use meta::DocumentMeta;
pub use vocabulary::{TermInfo, Vocabulary, VocabularyEntry};
