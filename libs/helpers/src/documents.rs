use rand::{self, Rng, RngCore};
use rand_distr::{Distribution, Poisson};
use std::cmp::min;

use scisearch::{base::TermFrequencies, corpus::Author, corpus::SourceDocument};

/// A random article together with its (already analyzed) terms
pub struct TestDocument {
    pub source: SourceDocument,
    pub terms: TermFrequencies,
}

pub fn term(ix: usize) -> String {
    format!("t{}", ix)
}

pub fn document_id(ix: usize) -> String {
    format!("doc{:06}", ix)
}

pub fn create_document(
    ix: usize,
    lambda_words: f64,
    max_words: usize,
    vocabulary_size: usize,
    rng: &mut dyn RngCore,
) -> TestDocument {
    let poi = Poisson::new(lambda_words).unwrap();
    let num_words = 1 + poi.sample(rng) as usize;

    let term_ids =
        rand::seq::index::sample(rng, vocabulary_size, min(num_words, max_words)).into_vec();
    let tf = Poisson::new(1.5).unwrap();

    let terms: TermFrequencies = term_ids
        .iter()
        .map(|&t| (term(t), 1 + tf.sample(rng) as u32))
        .collect();

    let source = SourceDocument {
        id: document_id(ix),
        title: format!("Article {}", ix),
        authors: vec![Author {
            name: format!("Author {}", ix % 7),
            ids: vec![format!("a{}", ix % 7)],
        }],
        year: Some(1990 + (ix % 30) as i16),
        journal_name: "Journal of Tests".to_string(),
        ..Default::default()
    };

    TestDocument { source, terms }
}

/// Creates documents citing each other
///
/// Every document cites up to `max_citations` random documents; in-citations
/// are set consistently with the out-citations.
pub fn create_corpus(
    document_count: usize,
    lambda_words: f64,
    max_words: usize,
    vocabulary_size: usize,
    max_citations: usize,
    rng: &mut dyn RngCore,
) -> Vec<TestDocument> {
    let mut documents: Vec<TestDocument> = (0..document_count)
        .map(|ix| create_document(ix, lambda_words, max_words, vocabulary_size, rng))
        .collect();

    if document_count < 2 {
        return documents;
    }
    for ix in 0..document_count {
        let count = rng.gen_range(0..=max_citations.min(document_count - 1));
        for target in rand::seq::index::sample(rng, document_count, count).into_iter() {
            if target != ix {
                documents[ix].source.out_citations.push(document_id(target));
                documents[target].source.in_citations.push(document_id(ix));
            }
        }
    }
    documents
}
