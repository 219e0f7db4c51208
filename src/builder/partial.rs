//! In-memory partial index over one batch of documents

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::base::{DocId, Len, Posting, TermFrequencies, POSTINGS_FILE, VOCABULARY_FILE};
use crate::builder::tf_log::TermFrequencyLog;
use crate::error::{IoContext, Result};
use crate::format::{posting::write_posting, VocabularyEntry};

/// Files of a dumped partial index
#[derive(Clone, Debug)]
pub struct PartialIndexFiles {
    pub vocabulary: PathBuf,
    pub postings: PathBuf,
}

impl PartialIndexFiles {
    pub fn in_folder(folder: &Path) -> Self {
        Self {
            vocabulary: folder.join(VOCABULARY_FILE),
            postings: folder.join(POSTINGS_FILE),
        }
    }
}

#[derive(Default)]
pub struct PartialIndex {
    postings: HashMap<String, Vec<Posting>>,
    documents: usize,
}

impl PartialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the terms of a document and returns the document length
    ///
    /// The terms are also appended to the term frequency log.
    pub fn add(
        &mut self,
        docid: DocId,
        terms: &TermFrequencies,
        tf_log: &mut TermFrequencyLog,
    ) -> Result<u32> {
        let mut length = 0u32;
        for (term, &tf) in terms.iter() {
            let posting = Posting { tf, docid };
            match self.postings.get_mut(term) {
                Some(postings) => postings.push(posting),
                None => {
                    self.postings.insert(term.clone(), vec![posting]);
                }
            }
            length = length.saturating_add(tf);
        }
        tf_log.append(terms)?;
        self.documents += 1;
        Ok(length)
    }

    /// Number of documents added
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Writes the sorted vocabulary (`term df`) and the postings to `folder`
    pub fn dump(self, folder: &Path) -> Result<PartialIndexFiles> {
        fs::create_dir_all(folder).context(|| format!("creating {}", folder.display()))?;
        let files = PartialIndexFiles::in_folder(folder);

        let mut terms: Vec<(String, Vec<Posting>)> = self.postings.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let vocabulary_context = || format!("writing {}", files.vocabulary.display());
        let postings_context = || format!("writing {}", files.postings.display());
        let mut vocabulary =
            BufWriter::new(File::create(&files.vocabulary).context(vocabulary_context)?);
        let mut postings = BufWriter::new(File::create(&files.postings).context(postings_context)?);

        let mut count = 0;
        for (term, term_postings) in terms.iter() {
            VocabularyEntry {
                term: term.clone(),
                df: term_postings.len() as u32,
                offset: 0,
            }
            .write_partial(&mut vocabulary)
            .context(vocabulary_context)?;

            for posting in term_postings.iter() {
                write_posting(&mut postings, posting).context(postings_context)?;
            }
            count += term_postings.len();
        }
        vocabulary.flush().context(vocabulary_context)?;
        postings.flush().context(postings_context)?;

        info!(
            "Dumped partial index in {}: {} documents, {} terms, {} postings",
            folder.display(),
            self.documents,
            terms.len(),
            count
        );
        debug!("Partial vocabulary at {}", files.vocabulary.display());
        Ok(files)
    }
}

impl Len for PartialIndex {
    /// Number of distinct terms
    fn len(&self) -> usize {
        self.postings.len()
    }
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;
    use crate::format::posting::read_posting;

    fn terms(pairs: &[(&str, u32)]) -> TermFrequencies {
        pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect()
    }

    #[test]
    fn test_add_and_dump() {
        let dir = TempDir::new().unwrap();
        let mut log = TermFrequencyLog::create(&dir.path().join("tf.log")).unwrap();

        let mut index = PartialIndex::new();
        assert_eq!(index.add(0, &terms(&[("b", 2), ("a", 1)]), &mut log).unwrap(), 3);
        assert_eq!(index.add(1, &terms(&[("b", 4)]), &mut log).unwrap(), 4);
        assert_eq!(index.len(), 2);
        assert_eq!(index.documents(), 2);

        let files = index.dump(&dir.path().join("partial_0")).unwrap();
        assert_eq!(
            std::fs::read_to_string(&files.vocabulary).unwrap(),
            "a 1\nb 2\n"
        );

        let data = std::fs::read(&files.postings).unwrap();
        assert_eq!(data.len(), 3 * Posting::SIZE);
        let mut reader = data.as_slice();
        let postings: Vec<Posting> = (0..3).map(|_| read_posting(&mut reader).unwrap()).collect();
        assert_eq!(
            postings,
            vec![
                Posting { tf: 1, docid: 0 },
                Posting { tf: 2, docid: 0 },
                Posting { tf: 4, docid: 1 },
            ]
        );
    }
}
