use std::collections::BTreeMap;
use std::fmt;

/// Dense internal document identifier (row of the metadata file)
pub type DocId = u32;

/// Number of occurrences of a term
pub type TermFrequency = u32;

/// Term -> frequency map for one document, as produced by an analyzer
pub type TermFrequencies = BTreeMap<String, TermFrequency>;

/// Marks object that have a length
pub trait Len {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Largest span a single memory map may cover
pub const MAX_PAGE_SIZE: u64 = i32::MAX as u64;

// Final index files
pub const VOCABULARY_FILE: &str = "vocabulary.txt";
pub const POSTINGS_FILE: &str = "postings.bin";
pub const DOCUMENTS_META_FILE: &str = "documents_meta.bin";
pub const DOCUMENTS_FILE: &str = "documents.bin";
pub const INDEX_META_FILE: &str = "index_meta.txt";

// Build temporaries (relative to the index folder)
pub const TMP_FOLDER: &str = "tmp";
pub const TF_LOG_FILE: &str = "doc_tf.log";
pub const TERM_DF_LOG_FILE: &str = "term_df.log";
pub const CITATIONS_LOG_FILE: &str = "citations.log";
pub const GRAPH_FILE: &str = "graph.bin";

/// One (term frequency, document) pair of a posting list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Posting {
    pub tf: TermFrequency,
    pub docid: DocId,
}

impl Posting {
    /// Size of an encoded posting
    pub const SIZE: usize = 2 * std::mem::size_of::<u32>();
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.docid, self.tf)
    }
}
