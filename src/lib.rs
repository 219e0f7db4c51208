//! Disk-backed inverted index over scientific articles.
//!
//! The index is built once by [`builder::IndexBuilder`] (partial indexes,
//! external merge, VSM weights, PageRank) and then served read-only through
//! [`index::Index`] and the ranking models of [`search`].

pub mod analysis;
pub mod base;
pub mod builder;
pub mod corpus;
pub mod error;
pub mod format;
pub mod index;
pub mod pagerank;
pub mod search;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
