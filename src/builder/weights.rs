//! Second indexing pass: document norms for the vector space model

use std::path::Path;

use log::{info, warn};

use crate::base::{DocId, TermFrequency};
use crate::builder::tf_log::TermFrequencyLogReader;
use crate::error::{Error, Result};
use crate::format::Vocabulary;
use crate::store::DocumentStore;

/// Returns `(weight, max_tf)` of a document
///
/// `weight = sqrt(Σ (tf × (ln N − ln df))²) / max_tf`; a document without
/// terms has a null weight.
pub fn document_weight<I>(terms: I, documents: u32) -> (f64, TermFrequency)
where
    I: IntoIterator<Item = (TermFrequency, u32)>,
{
    let ln_n = (documents as f64).ln();
    let mut sum = 0f64;
    let mut max_tf = 0;
    for (tf, df) in terms {
        let w = tf as f64 * (ln_n - (df as f64).ln());
        sum += w * w;
        max_tf = max_tf.max(tf);
    }

    if max_tf == 0 {
        (0., 0)
    } else {
        (sum.sqrt() / max_tf as f64, max_tf)
    }
}

/// Computes the weight of every document of the term frequency log and
/// stores it in the document metadata
pub fn compute_weights(
    tf_log: &Path,
    vocabulary: &Vocabulary,
    store: &mut DocumentStore,
) -> Result<()> {
    let documents = store.count();
    info!("Computing VSM weights for {} documents", documents);

    let mut docid: DocId = 0;
    for terms in TermFrequencyLogReader::open(tf_log)? {
        let terms = terms?;
        if docid >= documents {
            return Err(Error::invalid_format(
                "term frequency log",
                format!("more lines than documents ({})", documents),
            ));
        }

        let mut pairs = Vec::with_capacity(terms.len());
        for (term, tf) in terms.iter() {
            match vocabulary.df(term) {
                Some(df) => pairs.push((*tf, df)),
                None => warn!("Term {:?} of document {} is not in the vocabulary", term, docid),
            }
        }

        let (weight, max_tf) = document_weight(pairs, documents);
        store.set_weight(docid, weight, max_tf)?;
        docid += 1;
    }

    if docid != documents {
        return Err(Error::invalid_format(
            "term frequency log",
            format!("{} lines for {} documents", docid, documents),
        ));
    }
    store.flush()
}

#[cfg(test)]
mod tests {
    use ntest::assert_about_eq;

    use super::*;

    #[test]
    fn test_weight() {
        // t1 occurs in both documents (no idf contribution), t2 in one
        let (weight, max_tf) = document_weight([(3, 2), (1, 1)], 2);
        assert_eq!(max_tf, 3);
        let expected = ((3. * (2f64.ln() - 2f64.ln())).powi(2)
            + (1. * (2f64.ln() - 1f64.ln())).powi(2))
        .sqrt()
            / 3.;
        assert_about_eq!(weight, expected, 1e-12);
        assert_about_eq!(weight, 2f64.ln() / 3., 1e-12);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(document_weight([], 10), (0., 0));
    }

    #[test]
    fn test_all_common_terms() {
        let (weight, max_tf) = document_weight([(2, 5), (4, 5)], 5);
        assert_eq!(max_tf, 4);
        assert_eq!(weight, 0.);
    }
}
