//! Read-only access to a built index
//!
//! The vocabulary is loaded in memory; postings, document metadata and
//! document records are read through paged memory maps.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::info;

use crate::base::{
    DocId, Len, Posting, INDEX_META_FILE, MAX_PAGE_SIZE, POSTINGS_FILE, VOCABULARY_FILE,
};
use crate::error::{Error, IoContext, Result};
use crate::format::posting::decode_posting;
use crate::format::{Document, DocumentMeta, IndexMeta, Vocabulary};
use crate::store::DocumentStore;
use crate::utils::buffer::{AccessMode, PagedBuffer};

pub struct Index {
    folder: PathBuf,
    meta: IndexMeta,
    vocabulary: Vocabulary,
    postings: PagedBuffer,
    store: DocumentStore,
}

impl Index {
    pub fn open(folder: &Path) -> Result<Self> {
        Self::open_with_page_size(folder, MAX_PAGE_SIZE)
    }

    /// Opens an index, mapping its files with pages of at most
    /// `max_page_size` bytes
    pub fn open_with_page_size(folder: &Path, max_page_size: u64) -> Result<Self> {
        if !folder.is_dir() {
            return Err(Error::MissingPath(folder.to_path_buf()));
        }

        let meta = IndexMeta::read(&folder.join(INDEX_META_FILE))?;
        let vocabulary = Vocabulary::load(&folder.join(VOCABULARY_FILE))?;
        let postings = PagedBuffer::open_fixed(
            &folder.join(POSTINGS_FILE),
            Posting::SIZE,
            max_page_size,
            AccessMode::ReadOnly,
        )?;
        let store = DocumentStore::open(folder, AccessMode::ReadOnly, max_page_size)?;

        if store.count() != meta.articles {
            return Err(Error::invalid_format(
                "index meta",
                format!(
                    "{} articles declared, {} in the document store",
                    meta.articles,
                    store.count()
                ),
            ));
        }

        info!(
            "Opened index {} ({} documents, {} terms)",
            folder.display(),
            meta.articles,
            vocabulary.len()
        );
        Ok(Self {
            folder: folder.to_path_buf(),
            meta,
            vocabulary,
            postings,
            store,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn index_meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn documents_count(&self) -> DocId {
        self.store.count()
    }

    pub fn avgdl(&self) -> f64 {
        self.meta.avgdl
    }

    /// Document frequency (0 for an unknown term)
    pub fn df(&self, term: &str) -> u32 {
        self.vocabulary.df(term).unwrap_or(0)
    }

    /// Postings of a term; an unknown term has no postings
    pub fn postings(&self, term: &str) -> Result<PostingIterator> {
        let info = match self.vocabulary.get(term) {
            Some(info) if info.df > 0 => info,
            _ => return Ok(PostingIterator::default()),
        };

        let mut block = vec![0u8; info.df as usize * Posting::SIZE];
        self.postings
            .reader(info.offset)?
            .read_exact(&mut block)
            .context(|| format!("reading the postings of {:?}", term))?;
        Ok(PostingIterator::new(block))
    }

    /// Metadata of a document, or `None` for an unknown ID
    pub fn meta(&self, docid: DocId) -> Result<Option<DocumentMeta>> {
        if docid >= self.store.count() {
            return Ok(None);
        }
        self.store.meta(docid).map(Some)
    }

    /// Full record of a document, or `None` for an unknown ID
    pub fn document(&self, docid: DocId) -> Result<Option<Document>> {
        match self.meta(docid)? {
            Some(meta) => self.store.document(&meta).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("folder", &self.folder)
            .field("meta", &self.meta)
            .field("terms", &self.vocabulary.len())
            .finish()
    }
}

/// Iterates over a block of postings read from the postings file
#[derive(Default)]
pub struct PostingIterator {
    block: Vec<u8>,
    position: usize,
}

impl PostingIterator {
    fn new(block: Vec<u8>) -> Self {
        Self { block, position: 0 }
    }
}

impl Iterator for PostingIterator {
    type Item = Posting;

    fn next(&mut self) -> Option<Posting> {
        if self.position * Posting::SIZE >= self.block.len() {
            return None;
        }
        let posting = decode_posting(&self.block, self.position);
        self.position += 1;
        Some(posting)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.block.len() / Posting::SIZE - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PostingIterator {}
