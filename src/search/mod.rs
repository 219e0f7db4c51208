//! Ranking models
//!
//! A query is a list of weighted terms; duplicates are merged before
//! scoring. Models produce raw scores over a candidate set, which are then
//! (for VSM and BM25+) blended with the normalized PageRank of the
//! candidates and truncated to the requested number of results.

pub mod bm25;
pub mod existential;
pub mod vsm;

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;

use derivative::Derivative;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::base::DocId;
use crate::error::{Error, Result};
use crate::format::DocumentMeta;
use crate::index::Index;

pub use bm25::Bm25;
pub use existential::Existential;
pub use vsm::VectorSpaceModel;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub term: String,
    pub weight: f64,
}

impl QueryTerm {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// Sums the weights of duplicate terms (output sorted by term)
pub fn merge_terms<I: IntoIterator<Item = QueryTerm>>(terms: I) -> Vec<QueryTerm> {
    let mut merged = BTreeMap::<String, f64>::new();
    for QueryTerm { term, weight } in terms {
        *merged.entry(term).or_insert(0.) += weight;
    }
    merged
        .into_iter()
        .map(|(term, weight)| QueryTerm { term, weight })
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub struct ScoredDocument {
    pub docid: DocId,
    pub score: f64,
}

impl fmt::Display for ScoredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.docid, self.score)
    }
}

impl PartialEq for ScoredDocument {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDocument {}

impl PartialOrd for ScoredDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Greater is better: higher score, then lower document ID
impl Ord for ScoredDocument {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.docid.cmp(&self.docid))
    }
}

/// Keeps the `top_k` best documents
pub struct TopScoredDocuments {
    heap: BinaryHeap<Reverse<ScoredDocument>>,
    top_k: usize,
}

impl TopScoredDocuments {
    pub fn new(top_k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(top_k.saturating_add(1).min(1 << 16)),
            top_k,
        }
    }

    pub fn add(&mut self, candidate: DocId, score: f64) {
        if self.top_k == 0 {
            return;
        }
        let candidate = ScoredDocument {
            docid: candidate,
            score,
        };
        if self.heap.len() < self.top_k {
            self.heap.push(Reverse(candidate));
        } else if matches!(self.heap.peek(), Some(Reverse(worst)) if *worst < candidate) {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
        }
    }

    /// Best documents first
    pub fn into_sorted_vec(self) -> Vec<ScoredDocument> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(document)| document)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Existential,
    Vsm,
    Bm25,
}

#[derive(Derivative, Clone, Debug, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct SearchOptions {
    #[derivative(Default(value = "Model::Bm25"))]
    pub model: Model,

    #[derivative(Default(value = "10"))]
    pub top_k: usize,

    /// Weight of the model score in the blended score
    #[derivative(Default(value = "0.9"))]
    pub model_weight: f64,

    /// Weight of the normalized PageRank in the blended score
    #[derivative(Default(value = "0.1"))]
    pub pagerank_weight: f64,

    #[derivative(Default(value = "2.0"))]
    pub k1: f64,

    #[derivative(Default(value = "0.75"))]
    pub b: f64,

    /// BM25+ lower bound of a matching term contribution
    #[derivative(Default(value = "1.0"))]
    pub delta: f64,
}

/// Scores the documents matching a (merged) query
pub trait RankingModel {
    fn name(&self) -> &'static str;

    /// Raw scores of the candidate documents, in any order
    fn score(&self, index: &Index, query: &[QueryTerm]) -> Result<Vec<ScoredDocument>>;

    /// Whether scores are blended with PageRank
    fn blend(&self) -> bool {
        true
    }
}

impl Model {
    pub fn ranking(&self, options: &SearchOptions) -> Box<dyn RankingModel> {
        match self {
            Model::Existential => Box::new(Existential),
            Model::Vsm => Box::new(VectorSpaceModel),
            Model::Bm25 => Box::new(Bm25 {
                k1: options.k1,
                b: options.b,
                delta: options.delta,
            }),
        }
    }
}

/// Metadata of a document referenced by a posting
pub(crate) fn candidate_meta(index: &Index, docid: DocId) -> Result<DocumentMeta> {
    index.meta(docid)?.ok_or_else(|| {
        Error::invalid_format(
            "postings",
            format!(
                "document {} out of range ({} documents)",
                docid,
                index.documents_count()
            ),
        )
    })
}

/// `model_weight × score + pagerank_weight × pagerank / max pagerank`,
/// the maximum being taken over the candidates
pub fn blend(
    index: &Index,
    candidates: &mut [ScoredDocument],
    model_weight: f64,
    pagerank_weight: f64,
) -> Result<()> {
    let mut pageranks = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter() {
        pageranks.push(candidate_meta(index, candidate.docid)?.pagerank);
    }

    let max_pagerank = pageranks.iter().copied().fold(0f64, f64::max);
    for (candidate, pagerank) in candidates.iter_mut().zip(pageranks) {
        let normalized = if max_pagerank > 0. {
            pagerank / max_pagerank
        } else {
            0.
        };
        candidate.score = model_weight * candidate.score + pagerank_weight * normalized;
    }
    Ok(())
}

/// Ranks the documents of `index` for a query
pub fn search(
    index: &Index,
    query: Vec<QueryTerm>,
    options: &SearchOptions,
) -> Result<Vec<ScoredDocument>> {
    let query = merge_terms(query);
    let model = options.model.ranking(options);

    let mut candidates = model.score(index, &query)?;
    debug!(
        "{}: {} candidates for {} terms",
        model.name(),
        candidates.len(),
        query.len()
    );
    if model.blend() {
        blend(
            index,
            &mut candidates,
            options.model_weight,
            options.pagerank_weight,
        )?;
    }

    let mut top = TopScoredDocuments::new(options.top_k);
    for candidate in candidates {
        top.add(candidate.docid, candidate.score);
    }
    Ok(top.into_sorted_vec())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use crate::analysis::SimpleAnalyzer;
    use crate::builder::{BuilderOptions, IndexBuilder};
    use crate::corpus::SourceDocument;
    use crate::index::Index;

    /// Builds an index of `(id, title)` documents in `folder`
    pub fn index_of(folder: &Path, documents: &[(&str, &str)]) -> Index {
        let analyzer = SimpleAnalyzer::new();
        let mut builder =
            IndexBuilder::new(folder, BuilderOptions::default(), &analyzer).unwrap();
        for (id, title) in documents {
            builder
                .add(&SourceDocument {
                    id: id.to_string(),
                    title: title.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }
        builder.build().unwrap();
        Index::open(folder).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_terms() {
        let merged = merge_terms(vec![
            QueryTerm::new("b", 1.),
            QueryTerm::new("a", 0.5),
            QueryTerm::new("b", 2.),
        ]);
        assert_eq!(
            merged,
            vec![QueryTerm::new("a", 0.5), QueryTerm::new("b", 3.)]
        );
    }

    #[test]
    fn test_top_scored() {
        let mut top = TopScoredDocuments::new(3);
        for (docid, score) in [(4, 0.5), (1, 0.9), (3, 0.5), (0, 0.1), (2, 0.5)] {
            top.add(docid, score);
        }
        let docids: Vec<DocId> = top.into_sorted_vec().iter().map(|d| d.docid).collect();
        // Ties are broken by ascending document ID
        assert_eq!(docids, vec![1, 2, 3]);
    }

    #[test]
    fn test_top_zero() {
        let mut top = TopScoredDocuments::new(0);
        top.add(0, 1.);
        assert!(top.into_sorted_vec().is_empty());
    }
}
