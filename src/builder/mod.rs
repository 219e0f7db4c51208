//! Index construction
//!
//! The build runs in sequential phases:
//!
//! 1. documents are analyzed and stored; their postings accumulate in an
//!    in-memory partial index that is dumped every
//!    [`BuilderOptions::partial_index_max_docs`] documents
//! 2. the partial indexes are merged ([`merge`])
//! 3. the VSM document weights are computed ([`weights`])
//! 4. PageRank and author ranks are computed ([`crate::pagerank`])
//! 5. the index meta file is written and temporary files removed

pub mod merge;
pub mod partial;
pub mod tf_log;
pub mod weights;

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use derivative::Derivative;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::base::{
    DocId, TermFrequencies, CITATIONS_LOG_FILE, GRAPH_FILE, INDEX_META_FILE, MAX_PAGE_SIZE,
    TF_LOG_FILE, TMP_FOLDER, VOCABULARY_FILE,
};
use crate::corpus::{CorpusReader, SourceDocument};
use crate::error::{Error, IoContext, Result};
use crate::format::{DocumentMeta, IndexMeta, Vocabulary};
use crate::pagerank::{compute_pagerank, CitationLog, PageRankOptions};
use crate::store::{DocumentStore, DocumentStoreWriter};
use crate::utils::buffer::AccessMode;

use self::merge::merge;
use self::partial::{PartialIndex, PartialIndexFiles};
use self::tf_log::TermFrequencyLog;
use self::weights::compute_weights;

#[derive(Derivative, Clone, Debug, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct BuilderOptions {
    /// Number of documents of a partial index before it is dumped to disk
    #[derivative(Default(value = "50000"))]
    pub partial_index_max_docs: usize,

    pub pagerank: PageRankOptions,

    /// Largest memory mapping used when updating the document store
    #[derivative(Default(value = "MAX_PAGE_SIZE"))]
    pub max_page_size: u64,

    pub show_progress: bool,
}

pub struct IndexBuilder<'a> {
    folder: PathBuf,
    tmp: PathBuf,
    options: BuilderOptions,
    analyzer: &'a dyn Analyzer,

    store: DocumentStoreWriter,
    tf_log: TermFrequencyLog,
    citations: CitationLog,

    partial: PartialIndex,
    partials: Vec<PartialIndexFiles>,

    /// Sum of the document lengths
    total_length: u64,
    skipped: usize,
}

impl<'a> IndexBuilder<'a> {
    /// Prepares a build into `folder`, which must not exist or be empty
    pub fn new(folder: &Path, options: BuilderOptions, analyzer: &'a dyn Analyzer) -> Result<Self> {
        if options.partial_index_max_docs == 0 {
            return Err(Error::invalid_arg(
                "partial_index_max_docs",
                "should be strictly positive",
            ));
        }
        if options.max_page_size < DocumentMeta::RECORD_SIZE as u64 {
            return Err(Error::invalid_arg(
                "max_page_size",
                format!("should hold at least one {}-byte record", DocumentMeta::RECORD_SIZE),
            ));
        }

        if folder.exists() {
            let mut entries =
                fs::read_dir(folder).context(|| format!("listing {}", folder.display()))?;
            if entries.next().is_some() {
                return Err(Error::IndexExists(folder.to_path_buf()));
            }
        }

        let tmp = folder.join(TMP_FOLDER);
        fs::create_dir_all(&tmp).context(|| format!("creating {}", tmp.display()))?;
        info!("Building index in {}", folder.display());

        Ok(Self {
            store: DocumentStoreWriter::create(folder)?,
            tf_log: TermFrequencyLog::create(&tmp.join(TF_LOG_FILE))?,
            citations: CitationLog::create(&tmp.join(CITATIONS_LOG_FILE))?,
            folder: folder.to_path_buf(),
            tmp,
            options,
            analyzer,
            partial: PartialIndex::new(),
            partials: Vec::new(),
            total_length: 0,
            skipped: 0,
        })
    }

    /// Analyzes and indexes a document
    ///
    /// Returns the internal ID of the document, or `None` if it was skipped
    pub fn add(&mut self, document: &SourceDocument) -> Result<Option<DocId>> {
        let terms = self.analyzer.term_frequencies(document);
        self.add_terms(document, terms)
    }

    /// Indexes a document with already computed term frequencies
    pub fn add_terms(
        &mut self,
        document: &SourceDocument,
        mut terms: TermFrequencies,
    ) -> Result<Option<DocId>> {
        if document.id.is_empty() || document.id.len() > DocumentMeta::ID_SIZE {
            warn!("Skipping document with invalid identifier {:?}", document.id);
            self.skipped += 1;
            return Ok(None);
        }

        terms.retain(|term, tf| {
            let valid = *tf > 0 && !term.is_empty() && !term.contains(char::is_whitespace);
            if !valid {
                warn!("Skipping term {:?} of document {}", term, document.id);
            }
            valid
        });

        let docid = self.store.count();
        let length = self.partial.add(docid, &terms, &mut self.tf_log)?;
        self.store
            .append(&document.id, length, &document.to_document())?;
        self.citations
            .append(&document.out_citations, &document.in_citations)?;
        self.total_length += length as u64;

        if self.partial.documents() >= self.options.partial_index_max_docs {
            self.dump_partial()?;
        }
        Ok(Some(docid))
    }

    /// Indexes every document of a corpus and returns the number of
    /// indexed documents
    pub fn add_corpus(&mut self, mut corpus: CorpusReader) -> Result<usize> {
        let mut count = 0;
        for document in corpus.by_ref() {
            if self.add(&document?)?.is_some() {
                count += 1;
            }
            if count > 0 && count % 100_000 == 0 {
                info!("Indexed {} documents", count);
            }
        }
        info!(
            "Indexed {} documents ({} malformed records)",
            count,
            corpus.skipped()
        );
        Ok(count)
    }

    /// Number of documents skipped because of an invalid identifier
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn dump_partial(&mut self) -> Result<()> {
        let partial = mem::take(&mut self.partial);
        let folder = self.tmp.join(format!("partial_{}", self.partials.len()));
        debug!(
            "Dumping partial index {} ({} documents)",
            self.partials.len(),
            partial.documents()
        );
        self.partials.push(partial.dump(&folder)?);
        Ok(())
    }

    /// Runs the remaining phases and returns the description of the index
    pub fn build(mut self) -> Result<IndexMeta> {
        if self.partial.documents() > 0 || self.partials.is_empty() {
            self.dump_partial()?;
        }

        let IndexBuilder {
            folder,
            tmp,
            options,
            analyzer,
            store,
            tf_log,
            citations,
            partials,
            total_length,
            ..
        } = self;

        tf_log.finish()?;
        citations.finish()?;
        let documents = store.finish()?;

        let stats = merge(&partials, &folder, &tmp, options.show_progress)?;
        info!("Vocabulary: {} terms, {} postings", stats.terms, stats.postings);

        let mut store = DocumentStore::open(&folder, AccessMode::ReadWrite, options.max_page_size)?;
        {
            let vocabulary = Vocabulary::load(&folder.join(VOCABULARY_FILE))?;
            compute_weights(&tmp.join(TF_LOG_FILE), &vocabulary, &mut store)?;
        }
        compute_pagerank(
            &tmp.join(CITATIONS_LOG_FILE),
            &tmp.join(GRAPH_FILE),
            &mut store,
            &options.pagerank,
            options.show_progress,
        )?;
        store.close()?;

        let config = analyzer.config();
        let meta = IndexMeta {
            use_stemmer: config.use_stemmer,
            use_stopwords: config.use_stopwords,
            articles: documents,
            avgdl: if documents > 0 {
                total_length as f64 / documents as f64
            } else {
                0.
            },
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            pagerank_damping: options.pagerank.damping,
            pagerank_threshold: options.pagerank.threshold,
        };
        meta.write(&folder.join(INDEX_META_FILE))?;

        fs::remove_dir_all(&tmp).context(|| format!("removing {}", tmp.display()))?;
        info!(
            "Index built in {}: {} documents, avgdl {:.2}",
            folder.display(),
            meta.articles,
            meta.avgdl
        );
        Ok(meta)
    }
}

/// Builds an index from a corpus file or folder
///
/// The corpus must exist; nothing is written otherwise.
pub fn build_index(
    corpus: &Path,
    folder: &Path,
    options: BuilderOptions,
    analyzer: &dyn Analyzer,
) -> Result<IndexMeta> {
    let corpus = CorpusReader::open(corpus)?;
    let mut builder = IndexBuilder::new(folder, options, analyzer)?;
    builder.add_corpus(corpus)?;
    builder.build()
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;
    use crate::analysis::SimpleAnalyzer;
    use crate::base::{DOCUMENTS_FILE, POSTINGS_FILE};

    fn document(id: &str, title: &str) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_existing_folder() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("something"), "").unwrap();
        let analyzer = SimpleAnalyzer::new();
        assert!(matches!(
            IndexBuilder::new(dir.path(), BuilderOptions::default(), &analyzer),
            Err(Error::IndexExists(_))
        ));
    }

    #[test]
    fn test_missing_corpus() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("index");
        let analyzer = SimpleAnalyzer::new();
        assert!(matches!(
            build_index(
                &dir.path().join("nope.jsonl"),
                &folder,
                BuilderOptions::default(),
                &analyzer
            ),
            Err(Error::MissingPath(_))
        ));
        assert!(!folder.exists());
    }

    #[test]
    fn test_skipped_documents() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("index");
        let analyzer = SimpleAnalyzer::new();
        let mut builder = IndexBuilder::new(&folder, BuilderOptions::default(), &analyzer).unwrap();

        assert_eq!(builder.add(&document("a", "one two")).unwrap(), Some(0));
        assert_eq!(builder.add(&document("", "empty id")).unwrap(), None);
        assert_eq!(builder.add(&document(&"x".repeat(41), "long")).unwrap(), None);
        let terms = TermFrequencies::from([("two".to_string(), 1), ("bad term".to_string(), 3)]);
        assert_eq!(builder.add_terms(&document("b", ""), terms).unwrap(), Some(1));
        assert_eq!(builder.skipped(), 2);

        let meta = builder.build().unwrap();
        assert_eq!(meta.articles, 2);
        assert_eq!(meta.avgdl, 1.5);
        assert_eq!(
            std::fs::read_to_string(folder.join(VOCABULARY_FILE)).unwrap(),
            "one 1 0\ntwo 2 8\n"
        );
        assert!(!folder.join(TMP_FOLDER).exists());
        assert!(folder.join(POSTINGS_FILE).exists());
        assert!(folder.join(DOCUMENTS_FILE).exists());
    }

    #[test]
    fn test_null_frequencies() {
        use crate::index::Index;
        use crate::search::{Existential, QueryTerm, RankingModel};

        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("index");
        let analyzer = SimpleAnalyzer::new();
        let mut builder = IndexBuilder::new(&folder, BuilderOptions::default(), &analyzer).unwrap();

        let terms = TermFrequencies::from([("a".to_string(), 0), ("b".to_string(), 1)]);
        assert_eq!(builder.add_terms(&document("d0", ""), terms).unwrap(), Some(0));
        let meta = builder.build().unwrap();
        assert_eq!(meta.avgdl, 1.);

        let index = Index::open(&folder).unwrap();
        assert_eq!(index.df("a"), 0);
        assert_eq!(index.postings("a").unwrap().count(), 0);
        assert_eq!(index.df("b"), 1);

        // A term with no occurrence does not make the document a candidate
        let results = Existential
            .score(&index, &[QueryTerm::new("a", 1.)])
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_options_deserialize() {
        let options: BuilderOptions =
            serde_json::from_str(r#"{"partial_index_max_docs": 10}"#).unwrap();
        assert_eq!(options.partial_index_max_docs, 10);
        assert_eq!(options.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(options.pagerank.damping, 0.85);

        let options: BuilderOptions =
            serde_json::from_str(r#"{"pagerank": {"damping": 0.9}}"#).unwrap();
        assert_eq!(options.pagerank.damping, 0.9);
        assert_eq!(options.pagerank.threshold, 1e-10);
        assert_eq!(options.pagerank.max_iterations, 1000);
    }
}
