//! Document store
//!
//! Two parallel files: fixed-size [`DocumentMeta`] records indexed by
//! internal document ID, and variable-size [`Document`] records referenced
//! by the (offset, size) pair of their metadata.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::base::{DocId, Len, DOCUMENTS_FILE, DOCUMENTS_META_FILE};
use crate::error::{Error, IoContext, Result};
use crate::format::{Document, DocumentMeta};
use crate::utils::buffer::{variable_record_boundaries, AccessMode, PagedBuffer};

/// Appends documents in parse order during the first indexing pass
pub struct DocumentStoreWriter {
    folder: PathBuf,
    meta: BufWriter<File>,
    documents: BufWriter<File>,
    offset: u64,
    count: DocId,
}

impl DocumentStoreWriter {
    pub fn create(folder: &Path) -> Result<Self> {
        let create = |name: &str| -> Result<BufWriter<File>> {
            let path = folder.join(name);
            Ok(BufWriter::new(
                File::create(&path).context(|| format!("creating {}", path.display()))?,
            ))
        };

        Ok(Self {
            folder: folder.to_path_buf(),
            meta: create(DOCUMENTS_META_FILE)?,
            documents: create(DOCUMENTS_FILE)?,
            offset: 0,
            count: 0,
        })
    }

    /// Writes a document and returns its internal ID
    ///
    /// Weight, maximum term frequency, PageRank and author rank are written
    /// as zero and filled in by the later build passes.
    pub fn append(&mut self, id: &str, length: u32, document: &Document) -> Result<DocId> {
        let data = document.encode()?;
        let doc_size = u32::try_from(data.len())
            .map_err(|_| Error::invalid_arg("document", "record larger than 4GB"))?;

        let meta = DocumentMeta {
            id: id.to_string(),
            length,
            doc_size,
            doc_offset: self.offset,
            ..Default::default()
        };
        meta.write(&mut self.meta)?;
        self.documents
            .write_all(&data)
            .context(|| "writing document record".to_string())?;

        self.offset += data.len() as u64;
        let docid = self.count;
        self.count += 1;
        Ok(docid)
    }

    /// Number of documents written so far
    pub fn count(&self) -> DocId {
        self.count
    }

    pub fn finish(mut self) -> Result<DocId> {
        self.meta
            .flush()
            .context(|| format!("flushing {}", DOCUMENTS_META_FILE))?;
        self.documents
            .flush()
            .context(|| format!("flushing {}", DOCUMENTS_FILE))?;
        info!(
            "Document store in {} holds {} documents ({} bytes)",
            self.folder.display(),
            self.count,
            self.offset
        );
        Ok(self.count)
    }
}

/// Random access to the document store through paged memory maps
pub struct DocumentStore {
    meta: PagedBuffer,
    documents: PagedBuffer,
    count: DocId,
}

impl DocumentStore {
    pub fn open(folder: &Path, mode: AccessMode, max_page_size: u64) -> Result<Self> {
        let meta_path = folder.join(DOCUMENTS_META_FILE);
        let meta = PagedBuffer::open_fixed(
            &meta_path,
            DocumentMeta::RECORD_SIZE,
            max_page_size,
            mode,
        )?;
        if meta.len() % DocumentMeta::RECORD_SIZE as u64 != 0 {
            return Err(Error::invalid_format(
                "document metadata",
                format!(
                    "{} is not a multiple of {} bytes",
                    meta.len(),
                    DocumentMeta::RECORD_SIZE
                ),
            ));
        }
        let count = (meta.len() / DocumentMeta::RECORD_SIZE as u64) as DocId;

        // Document records are never split across pages
        let mut sizes = Vec::with_capacity(count as usize);
        for docid in 0..count {
            let record = meta.slice(DocumentMeta::position(docid), DocumentMeta::RECORD_SIZE)?;
            sizes.push(DocumentMeta::decode_doc_size(record) as u64);
        }
        let boundaries = variable_record_boundaries(sizes, max_page_size)?;
        let documents = PagedBuffer::open(&folder.join(DOCUMENTS_FILE), &boundaries, mode)?;

        debug!(
            "Opened document store with {} documents ({} + {} pages)",
            count,
            meta.pages().len(),
            documents.pages().len()
        );
        Ok(Self {
            meta,
            documents,
            count,
        })
    }

    fn record(&self, docid: DocId) -> Result<&[u8]> {
        self.meta
            .slice(DocumentMeta::position(docid), DocumentMeta::RECORD_SIZE)
    }

    fn record_mut(&mut self, docid: DocId) -> Result<&mut [u8]> {
        self.meta
            .slice_mut(DocumentMeta::position(docid), DocumentMeta::RECORD_SIZE)
    }

    pub fn meta(&self, docid: DocId) -> Result<DocumentMeta> {
        DocumentMeta::decode(self.record(docid)?)
    }

    /// The full record referenced by a metadata record
    pub fn document(&self, meta: &DocumentMeta) -> Result<Document> {
        Document::decode(self.documents.slice(meta.doc_offset, meta.doc_size as usize)?)
    }

    pub fn set_weight(&mut self, docid: DocId, weight: f64, max_tf: u32) -> Result<()> {
        DocumentMeta::set_weight(self.record_mut(docid)?, weight, max_tf);
        Ok(())
    }

    pub fn set_pagerank(&mut self, docid: DocId, pagerank: f64) -> Result<()> {
        DocumentMeta::set_pagerank(self.record_mut(docid)?, pagerank);
        Ok(())
    }

    pub fn set_author_rank(&mut self, docid: DocId, author_rank: f64) -> Result<()> {
        DocumentMeta::set_author_rank(self.record_mut(docid)?, author_rank);
        Ok(())
    }

    pub fn count(&self) -> DocId {
        self.count
    }

    pub fn flush(&self) -> Result<()> {
        self.meta.flush()?;
        self.documents.flush()
    }

    pub fn close(self) -> Result<()> {
        self.meta.close()?;
        self.documents.close()
    }
}

impl Len for DocumentStore {
    fn len(&self) -> usize {
        self.count as usize
    }
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;

    fn document(ix: usize) -> Document {
        Document {
            year: 2000 + ix as i16,
            title: format!("Title {}", "x".repeat(ix)),
            authors: vec![format!("Author {}", ix)],
            author_ids: vec![format!("{}", ix)],
            journal: "Journal".to_string(),
        }
    }

    #[test]
    fn test_store() {
        let dir = TempDir::new().unwrap();
        let mut writer = DocumentStoreWriter::create(dir.path()).unwrap();
        for ix in 0..20 {
            let docid = writer
                .append(&format!("doc{}", ix), ix as u32 * 10, &document(ix))
                .unwrap();
            assert_eq!(docid, ix as DocId);
        }
        assert_eq!(writer.finish().unwrap(), 20);

        // Small pages so that both files span several pages
        let mut store = DocumentStore::open(dir.path(), AccessMode::ReadWrite, 200).unwrap();
        assert_eq!(store.count(), 20);
        assert!(store.meta.pages().len() > 1);
        assert!(store.documents.pages().len() > 1);

        store.set_weight(7, 1.5, 3).unwrap();
        store.set_pagerank(7, 0.5).unwrap();
        store.close().unwrap();

        let store = DocumentStore::open(dir.path(), AccessMode::ReadOnly, 200).unwrap();
        for ix in 0..20 {
            let meta = store.meta(ix as DocId).unwrap();
            assert_eq!(meta.id, format!("doc{}", ix));
            assert_eq!(meta.length, ix as u32 * 10);
            assert_eq!(store.document(&meta).unwrap(), document(ix));
        }

        let meta = store.meta(7).unwrap();
        assert_eq!((meta.weight, meta.max_tf, meta.pagerank), (1.5, 3, 0.5));
        assert!(matches!(store.meta(20), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        DocumentStoreWriter::create(dir.path())
            .unwrap()
            .finish()
            .unwrap();
        let store = DocumentStore::open(dir.path(), AccessMode::ReadOnly, 1024).unwrap();
        assert!(store.is_empty());
    }
}
