use ntest::assert_about_eq;
use std::collections::HashMap;
use std::path::PathBuf;

use log::info;
use rand::{rngs::StdRng, SeedableRng};
use temp_dir::TempDir;

use crate::documents::{create_corpus, TestDocument};
use scisearch::{
    analysis::SimpleAnalyzer,
    base::Posting,
    builder::{weights::document_weight, BuilderOptions, IndexBuilder},
    format::IndexMeta,
    index::Index,
};

pub struct TestIndex {
    pub dir: TempDir,
    pub all_terms: HashMap<String, Vec<Posting>>,
    pub documents: Vec<TestDocument>,
    pub meta: IndexMeta,
}

impl TestIndex {
    pub fn new(
        vocabulary_size: usize,
        document_count: usize,
        lambda_words: f64,
        max_words: usize,
        seed: Option<u64>,
        options: BuilderOptions,
    ) -> Self {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let mut rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        let documents = create_corpus(
            document_count,
            lambda_words,
            max_words,
            vocabulary_size,
            5,
            &mut rng,
        );

        let analyzer = SimpleAnalyzer::new();
        let folder = dir.path().join("index");
        let mut builder = IndexBuilder::new(&folder, options, &analyzer)
            .expect("Error while creating the builder");

        let mut all_terms = HashMap::<String, Vec<Posting>>::new();
        for document in documents.iter() {
            let docid = builder
                .add_terms(&document.source, document.terms.clone())
                .expect("Error while adding a document")
                .expect("Document was skipped");

            for (term, &tf) in document.terms.iter() {
                all_terms
                    .entry(term.clone())
                    .or_default()
                    .push(Posting { tf, docid });
            }
        }

        let meta = builder.build().expect("Error while building the index");
        info!("Built test index with {} documents", meta.articles);

        Self {
            dir,
            all_terms,
            documents,
            meta,
        }
    }

    pub fn folder(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn open(&self, max_page_size: u64) -> Index {
        Index::open_with_page_size(&self.folder(), max_page_size)
            .expect("Error while opening the index")
    }
}

/// Checks the postings and document weights of an index against the
/// generated documents
pub fn check_index(index: &Index, data: &TestIndex) {
    assert_eq!(index.vocabulary().iter().count(), data.all_terms.len());

    for (term, expected) in data.all_terms.iter() {
        assert_eq!(index.df(term), expected.len() as u32, "DF of {}", term);
        let observed: Vec<Posting> = index.postings(term).unwrap().collect();
        assert_eq!(&observed, expected, "Postings of {}", term);
    }

    let n = data.documents.len() as u32;
    for (docid, document) in data.documents.iter().enumerate() {
        let meta = index.meta(docid as u32).unwrap().expect("missing document");
        assert_eq!(meta.id, document.source.id);
        assert_eq!(meta.length, document.terms.values().sum::<u32>());

        let (weight, max_tf) = document_weight(
            document
                .terms
                .iter()
                .map(|(term, &tf)| (tf, data.all_terms[term].len() as u32)),
            n,
        );
        assert_eq!(meta.max_tf, max_tf);
        assert_about_eq!(meta.weight, weight, 1e-9);
    }
}
