//! Text vocabularies
//!
//! Partial vocabularies hold one `term df` line per term; the final
//! vocabulary adds the byte offset of the term's posting block,
//! `term df offset`. In both cases lines are sorted by term.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

use log::info;

use crate::base::Len;
use crate::error::{Error, IoContext, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub term: String,
    pub df: u32,
    /// Offset of the posting block (0 in partial vocabularies)
    pub offset: u64,
}

impl VocabularyEntry {
    /// Parses a `term df offset` line
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let entry = Self {
            term: parse_term(fields.next(), line)?,
            df: parse_number(fields.next(), "df", line)?,
            offset: parse_number(fields.next(), "offset", line)?,
        };
        expect_end(fields.next(), line)?;
        Ok(entry)
    }

    /// Parses a `term df` line
    pub fn parse_partial(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let entry = Self {
            term: parse_term(fields.next(), line)?,
            df: parse_number(fields.next(), "df", line)?,
            offset: 0,
        };
        expect_end(fields.next(), line)?;
        Ok(entry)
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{} {} {}", self.term, self.df, self.offset)
    }

    pub fn write_partial<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{} {}", self.term, self.df)
    }
}

impl fmt::Display for VocabularyEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (df {}, offset {})", self.term, self.df, self.offset)
    }
}

fn parse_term(field: Option<&str>, line: &str) -> Result<String> {
    field
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_format("vocabulary", format!("empty line {:?}", line)))
}

fn parse_number<T: std::str::FromStr>(field: Option<&str>, name: &str, line: &str) -> Result<T> {
    field.and_then(|s| s.parse().ok()).ok_or_else(|| {
        Error::invalid_format("vocabulary", format!("invalid {} in {:?}", name, line))
    })
}

fn expect_end(field: Option<&str>, line: &str) -> Result<()> {
    match field {
        None => Ok(()),
        Some(_) => Err(Error::invalid_format(
            "vocabulary",
            format!("trailing data in {:?}", line),
        )),
    }
}

/// Streams the entries of a vocabulary file
pub struct VocabularyReader {
    lines: Lines<BufReader<File>>,
    partial: bool,
}

impl VocabularyReader {
    pub fn open(path: &Path, partial: bool) -> Result<Self> {
        let file = File::open(path).context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            partial,
        })
    }
}

impl Iterator for VocabularyReader {
    type Item = Result<VocabularyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(Error::io("reading vocabulary", e))),
        };
        Some(if self.partial {
            VocabularyEntry::parse_partial(&line)
        } else {
            VocabularyEntry::parse(&line)
        })
    }
}

/// Document frequency and posting block position of a term
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermInfo {
    pub df: u32,
    pub offset: u64,
}

/// The final vocabulary, loaded in memory
#[derive(Debug, Default, PartialEq)]
pub struct Vocabulary {
    terms: HashMap<String, TermInfo>,
}

impl Vocabulary {
    pub fn load(path: &Path) -> Result<Self> {
        let mut terms = HashMap::new();
        for entry in VocabularyReader::open(path, false)? {
            let entry = entry?;
            terms.insert(
                entry.term,
                TermInfo {
                    df: entry.df,
                    offset: entry.offset,
                },
            );
        }
        info!("Loaded {} terms from {}", terms.len(), path.display());
        Ok(Self { terms })
    }

    /// Exact match lookup
    pub fn get(&self, term: &str) -> Option<&TermInfo> {
        self.terms.get(term)
    }

    pub fn df(&self, term: &str) -> Option<u32> {
        self.terms.get(term).map(|info| info.df)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermInfo)> {
        self.terms.iter().map(|(term, info)| (term.as_str(), info))
    }
}

impl Len for Vocabulary {
    fn len(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let entry = VocabularyEntry::parse("neuron 12 96").unwrap();
        assert_eq!(
            entry,
            VocabularyEntry {
                term: "neuron".to_string(),
                df: 12,
                offset: 96
            }
        );

        let mut line = Vec::new();
        entry.write(&mut line).unwrap();
        assert_eq!(line, b"neuron 12 96\n");

        assert_eq!(VocabularyEntry::parse_partial("cell 3").unwrap().df, 3);
    }

    #[test]
    fn test_malformed() {
        assert!(VocabularyEntry::parse("").is_err());
        assert!(VocabularyEntry::parse("cell 3").is_err());
        assert!(VocabularyEntry::parse("cell x 3").is_err());
        assert!(VocabularyEntry::parse_partial("cell 3 4").is_err());
    }
}
