//! Text analysis interface
//!
//! Tokenization, stemming and stop-word removal are provided by the caller
//! through the [`Analyzer`] trait. The analyzer (and its configuration) is
//! constructed explicitly and passed by reference to the indexing pipeline.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::base::TermFrequencies;
use crate::corpus::SourceDocument;
use crate::search::QueryTerm;

/// Configuration recorded in the index meta file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub use_stemmer: bool,
    pub use_stopwords: bool,
}

/// Frequencies of a term in each indexed field of a document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldFrequencies {
    pub title: u32,
    pub body: u32,
}

impl FieldFrequencies {
    pub fn total(&self) -> u32 {
        self.title + self.body
    }
}

pub trait Analyzer {
    fn config(&self) -> TokenizerConfig;

    /// Splits a text into normalized terms (no whitespace inside a term)
    fn tokens(&self, text: &str) -> Vec<String>;

    /// Term -> per-field frequencies of a document
    fn field_frequencies(
        &self,
        document: &SourceDocument,
    ) -> BTreeMap<String, FieldFrequencies> {
        let mut frequencies = BTreeMap::<String, FieldFrequencies>::new();
        for token in self.tokens(&document.title) {
            frequencies.entry(token).or_default().title += 1;
        }
        for token in self.tokens(&document.paper_abstract) {
            frequencies.entry(token).or_default().body += 1;
        }
        frequencies
    }

    /// Term frequencies of a document (all fields summed)
    fn term_frequencies(&self, document: &SourceDocument) -> TermFrequencies {
        self.field_frequencies(document)
            .into_iter()
            .map(|(term, f)| (term, f.total()))
            .collect()
    }

    /// Turns a free-text query into weighted terms (one per occurrence)
    fn query(&self, text: &str) -> Vec<QueryTerm> {
        self.tokens(text)
            .into_iter()
            .map(|term| QueryTerm::new(term, 1.))
            .collect()
    }
}

/// Lowercases and splits on non-alphanumeric characters, with an optional
/// stop-word list. Does not stem.
#[derive(Clone, Debug, Default)]
pub struct SimpleAnalyzer {
    stopwords: Option<HashSet<String>>,
}

impl SimpleAnalyzer {
    pub fn new() -> Self {
        Self { stopwords: None }
    }

    pub fn with_stopwords<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: Some(
                stopwords
                    .into_iter()
                    .map(|s| s.into().to_lowercase())
                    .collect(),
            ),
        }
    }
}

impl Analyzer for SimpleAnalyzer {
    fn config(&self) -> TokenizerConfig {
        TokenizerConfig {
            use_stemmer: false,
            use_stopwords: self.stopwords.is_some(),
        }
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .filter(|s| match &self.stopwords {
                Some(stopwords) => !stopwords.contains(s),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        let analyzer = SimpleAnalyzer::with_stopwords(["the", "of"]);
        assert_eq!(
            analyzer.tokens("The structure of DNA-binding proteins"),
            vec!["structure", "dna", "binding", "proteins"]
        );
        assert!(analyzer.config().use_stopwords);
        assert!(!SimpleAnalyzer::new().config().use_stopwords);
    }

    #[test]
    fn test_field_frequencies() {
        let document = SourceDocument {
            id: "d".to_string(),
            title: "Protein folding".to_string(),
            paper_abstract: "Folding of a protein, protein design".to_string(),
            ..Default::default()
        };

        let analyzer = SimpleAnalyzer::new();
        let fields = analyzer.field_frequencies(&document);
        assert_eq!(fields["protein"], FieldFrequencies { title: 1, body: 2 });

        let terms = analyzer.term_frequencies(&document);
        assert_eq!(terms["protein"], 3);
        assert_eq!(terms["folding"], 2);
        assert_eq!(terms["design"], 1);
    }
}
