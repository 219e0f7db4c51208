//! Vector space model (cosine similarity)
//!
//! Query term weights are `(w / max w) × ln(N / (1 + df))`; document term
//! weights are `tf × (ln N − ln df) / max_tf`, whose norm is the weight
//! stored in the document metadata.

use std::collections::HashMap;

use crate::base::DocId;
use crate::error::Result;
use crate::index::Index;
use crate::search::{candidate_meta, QueryTerm, RankingModel, ScoredDocument};

pub struct VectorSpaceModel;

impl RankingModel for VectorSpaceModel {
    fn name(&self) -> &'static str {
        "vsm"
    }

    fn score(&self, index: &Index, query: &[QueryTerm]) -> Result<Vec<ScoredDocument>> {
        let max_weight = query
            .iter()
            .map(|term| term.weight)
            .fold(f64::NEG_INFINITY, f64::max);
        if query.is_empty() || max_weight <= 0. {
            return Ok(Vec::new());
        }

        let n = index.documents_count() as f64;
        let ln_n = n.ln();

        // Dot products, before division by max_tf
        let mut dots = HashMap::<DocId, f64>::new();
        let mut query_norm = 0f64;
        for term in query.iter() {
            let df = index.df(&term.term);
            if df == 0 {
                continue;
            }
            let q = term.weight / max_weight * (n / (1. + df as f64)).ln();
            query_norm += q * q;

            let idf = ln_n - (df as f64).ln();
            for posting in index.postings(&term.term)? {
                *dots.entry(posting.docid).or_insert(0.) += q * posting.tf as f64 * idf;
            }
        }

        let query_norm = query_norm.sqrt();
        if query_norm == 0. {
            return Ok(Vec::new());
        }

        let mut scored = Vec::with_capacity(dots.len());
        for (docid, dot) in dots {
            let meta = candidate_meta(index, docid)?;
            if meta.weight == 0. || meta.max_tf == 0 {
                continue;
            }
            scored.push(ScoredDocument {
                docid,
                score: dot / meta.max_tf as f64 / (meta.weight * query_norm),
            });
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use ntest::assert_about_eq;
    use temp_dir::TempDir;

    use super::*;
    use crate::search::testing::index_of;

    #[test]
    fn test_cosine() {
        let dir = TempDir::new().unwrap();
        let index = index_of(dir.path(), &[("d0", "a a b"), ("d1", "b c"), ("d2", "c")]);

        let results = VectorSpaceModel
            .score(&index, &[QueryTerm::new("a", 2.)])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].docid, 0);

        let (ln3, ln15) = (3f64.ln(), 1.5f64.ln());
        let expected = 2. * ln3 / (4. * ln3 * ln3 + ln15 * ln15).sqrt();
        assert_about_eq!(results[0].score, expected, 1e-9);
    }

    #[test]
    fn test_zero_norm_dropped() {
        let dir = TempDir::new().unwrap();
        let index = index_of(dir.path(), &[("d0", "a b"), ("d1", "a")]);

        let results = VectorSpaceModel
            .score(&index, &[QueryTerm::new("a", 1.)])
            .unwrap();
        let docids: Vec<_> = results.iter().map(|d| d.docid).collect();
        assert_eq!(docids, vec![0]);
    }

    #[test]
    fn test_empty_query() {
        let dir = TempDir::new().unwrap();
        let index = index_of(dir.path(), &[("d0", "a")]);
        assert!(VectorSpaceModel.score(&index, &[]).unwrap().is_empty());
        assert!(VectorSpaceModel
            .score(&index, &[QueryTerm::new("b", 1.)])
            .unwrap()
            .is_empty());
    }
}
