//! Boolean (OR) retrieval

use std::collections::BTreeSet;

use crate::error::Result;
use crate::index::Index;
use crate::search::{QueryTerm, RankingModel, ScoredDocument};

/// Every document containing at least one query term, with score 1
pub struct Existential;

impl RankingModel for Existential {
    fn name(&self) -> &'static str {
        "existential"
    }

    fn score(&self, index: &Index, query: &[QueryTerm]) -> Result<Vec<ScoredDocument>> {
        let mut documents = BTreeSet::new();
        for term in query.iter() {
            documents.extend(index.postings(&term.term)?.map(|posting| posting.docid));
        }
        Ok(documents
            .into_iter()
            .map(|docid| ScoredDocument { docid, score: 1. })
            .collect())
    }

    fn blend(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;
    use crate::search::testing::index_of;

    #[test]
    fn test_union() {
        let dir = TempDir::new().unwrap();
        let index = index_of(
            dir.path(),
            &[("d1", "a x"), ("d2", "b"), ("d3", "c"), ("d4", "a b")],
        );
        let query = vec![QueryTerm::new("a", 1.), QueryTerm::new("b", 1.)];

        let results = Existential.score(&index, &query).unwrap();
        let docids: Vec<_> = results.iter().map(|d| d.docid).collect();
        assert_eq!(docids, vec![0, 1, 3]);
        assert!(results.iter().all(|d| d.score == 1.));
    }

    #[test]
    fn test_unknown_term() {
        let dir = TempDir::new().unwrap();
        let index = index_of(dir.path(), &[("d1", "a")]);
        let results = Existential
            .score(&index, &[QueryTerm::new("zzz", 1.)])
            .unwrap();
        assert!(results.is_empty());
    }
}
