//! Temporary per-document term frequency log
//!
//! Line `k` holds the `term tf` pairs of document `k`, so that the weight
//! pass can recompute document norms once the final document frequencies
//! are known, without keeping the term frequencies in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::base::{TermFrequencies, TermFrequency};
use crate::error::{Error, IoContext, Result};

pub struct TermFrequencyLog {
    writer: BufWriter<File>,
}

impl TermFrequencyLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(
                File::create(path).context(|| format!("creating {}", path.display()))?,
            ),
        })
    }

    pub fn append(&mut self, terms: &TermFrequencies) -> Result<()> {
        let context = || "writing the term frequency log".to_string();
        let mut first = true;
        for (term, tf) in terms.iter() {
            if !first {
                self.writer.write_all(b" ").context(context)?;
            }
            write!(self.writer, "{} {}", term, tf).context(context)?;
            first = false;
        }
        self.writer.write_all(b"\n").context(context)
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .context(|| "flushing the term frequency log".to_string())
    }
}

/// Reads back the log, one document at a time
pub struct TermFrequencyLogReader {
    lines: Lines<BufReader<File>>,
}

impl TermFrequencyLogReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for TermFrequencyLogReader {
    type Item = Result<Vec<(String, TermFrequency)>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(Error::io("reading the term frequency log", e))),
        };
        Some(parse_line(&line))
    }
}

fn parse_line(line: &str) -> Result<Vec<(String, TermFrequency)>> {
    let mut fields = line.split_whitespace();
    let mut terms = Vec::new();
    while let Some(term) = fields.next() {
        let tf = fields
            .next()
            .and_then(|tf| tf.parse().ok())
            .ok_or_else(|| {
                Error::invalid_format("term frequency log", format!("bad line {:?}", line))
            })?;
        terms.push((term.to_string(), tf));
    }
    Ok(terms)
}
