//! Source records
//!
//! The corpus is a set of JSON-lines files, one article per line, using the
//! Semantic Scholar open corpus field names. Malformed lines are skipped with
//! a warning; I/O errors are reported.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};
use crate::format::Document;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub paper_abstract: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub in_citations: Vec<String>,
    #[serde(default)]
    pub out_citations: Vec<String>,
    #[serde(default)]
    pub year: Option<i16>,
    #[serde(default)]
    pub journal_name: String,
}

impl SourceDocument {
    /// The stored (full) record of this article
    pub fn to_document(&self) -> Document {
        Document {
            year: self.year.unwrap_or(0),
            title: self.title.clone(),
            authors: self.authors.iter().map(|a| a.name.clone()).collect(),
            author_ids: self
                .authors
                .iter()
                .map(|a| a.ids.first().cloned().unwrap_or_default())
                .collect(),
            journal: self.journal_name.clone(),
        }
    }
}

/// Iterates over the articles of one file or of all the files of a folder
/// (in file name order)
pub struct CorpusReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, Lines<BufReader<File>>, usize)>,
    skipped: usize,
}

impl CorpusReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingPath(path.to_path_buf()));
        }

        let files = if path.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(path).context(|| format!("listing {}", path.display()))? {
                let entry = entry.context(|| format!("listing {}", path.display()))?;
                if entry.path().is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };
        info!("Corpus {} has {} file(s)", path.display(), files.len());

        Ok(Self {
            files: files.into_iter(),
            current: None,
            skipped: 0,
        })
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for CorpusReader {
    type Item = Result<SourceDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((path, lines, line_no)) = &mut self.current {
                match lines.next() {
                    Some(Ok(line)) => {
                        *line_no += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<SourceDocument>(&line) {
                            Ok(document) => return Some(Ok(document)),
                            Err(e) => {
                                warn!(
                                    "Skipping malformed record {}:{}: {}",
                                    path.display(),
                                    line_no,
                                    e
                                );
                                self.skipped += 1;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Some(Err(Error::io(format!("reading {}", path.display()), e)))
                    }
                    None => self.current = None,
                }
            } else {
                let path = self.files.next()?;
                debug!("Reading corpus file {}", path.display());
                match File::open(&path) {
                    Ok(file) => self.current = Some((path, BufReader::new(file).lines(), 0)),
                    Err(e) => {
                        return Some(Err(Error::io(format!("opening {}", path.display()), e)))
                    }
                }
            }
        }
    }
}
