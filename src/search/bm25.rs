//! Okapi BM25+
//!
//! Each matching query term contributes
//! `w × idf × (tf (k1 + 1) / (tf + k1 (1 − b + b × len / avgdl)) + δ)` with
//! `idf = ln((N + 1) / df)`. The `+ δ` lower bound sits inside the idf
//! product (BM25+ form), not after it. Scores are divided by the best score
//! of the candidates.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use derivative::Derivative;

use crate::base::DocId;
use crate::error::Result;
use crate::index::Index;
use crate::search::{candidate_meta, QueryTerm, RankingModel, ScoredDocument};

#[derive(Derivative, Clone, Copy, Debug)]
#[derivative(Default)]
pub struct Bm25 {
    #[derivative(Default(value = "2.0"))]
    pub k1: f64,
    #[derivative(Default(value = "0.75"))]
    pub b: f64,
    #[derivative(Default(value = "1.0"))]
    pub delta: f64,
}

impl Bm25 {
    /// Length normalization of a document: `k1 (1 − b + b × len / avgdl)`
    fn length_norm(&self, length: u32, avgdl: f64) -> f64 {
        let relative = if avgdl > 0. {
            length as f64 / avgdl
        } else {
            1.
        };
        self.k1 * (1. - self.b + self.b * relative)
    }
}

impl RankingModel for Bm25 {
    fn name(&self) -> &'static str {
        "bm25+"
    }

    fn score(&self, index: &Index, query: &[QueryTerm]) -> Result<Vec<ScoredDocument>> {
        let n = index.documents_count() as f64;
        let avgdl = index.avgdl();

        let mut norms = HashMap::<DocId, f64>::new();
        let mut scores = HashMap::<DocId, f64>::new();
        for term in query.iter() {
            let df = index.df(&term.term);
            if df == 0 {
                continue;
            }
            let weight = term.weight * ((n + 1.) / df as f64).ln();

            for posting in index.postings(&term.term)? {
                let norm = match norms.entry(posting.docid) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        let length = candidate_meta(index, posting.docid)?.length;
                        *entry.insert(self.length_norm(length, avgdl))
                    }
                };
                let tf = posting.tf as f64;
                *scores.entry(posting.docid).or_insert(0.) +=
                    weight * (tf * (self.k1 + 1.) / (tf + norm) + self.delta);
            }
        }

        let max_score = scores.values().copied().fold(0f64, f64::max);
        Ok(scores
            .into_iter()
            .map(|(docid, score)| ScoredDocument {
                docid,
                score: if max_score > 0. {
                    score / max_score
                } else {
                    score
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use ntest::assert_about_eq;
    use temp_dir::TempDir;

    use super::*;
    use crate::search::testing::index_of;

    #[test]
    fn test_bm25() {
        let dir = TempDir::new().unwrap();
        // avgdl = (2 + 6 + 1) / 3 = 3
        let index = index_of(
            dir.path(),
            &[("d0", "a b"), ("d1", "a a a c c c"), ("d2", "b")],
        );

        let mut results = Bm25::default()
            .score(&index, &[QueryTerm::new("a", 1.)])
            .unwrap();
        results.sort_by_key(|d| d.docid);
        assert_eq!(results.len(), 2);

        // d0: tf = 1, norm = 2 (0.25 + 0.75 × 2/3) = 1.5
        // d1: tf = 3, norm = 2 (0.25 + 0.75 × 2) = 3.5
        let d0 = 1. * 3. / (1. + 1.5) + 1.;
        let d1 = 3. * 3. / (3. + 3.5) + 1.;
        assert_about_eq!(results[0].score, d0 / d1, 1e-9);
        assert_about_eq!(results[1].score, 1., 1e-12);
    }

    #[test]
    fn test_repeated_terms() {
        let dir = TempDir::new().unwrap();
        let index = index_of(dir.path(), &[("d0", "a b"), ("d1", "b c")]);

        // The weight of a term scales its contribution
        let results = Bm25::default()
            .score(&index, &[QueryTerm::new("a", 3.), QueryTerm::new("c", 1.)])
            .unwrap();
        let best = results
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(best.docid, 0);
        assert_eq!(best.score, 1.);
    }
}
