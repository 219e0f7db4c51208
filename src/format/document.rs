//! Variable-size document records
//!
//! `year:i16, titleLen:u32, authorNamesLen:u32, authorIdsLen:u32,
//! journalLen:u16` followed by the four byte strings. Author names and IDs
//! are joined with commas.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::warn;

use crate::error::{Error, Result};

const HEADER_SIZE: usize = 2 + 4 + 4 + 4 + 2;
const SEPARATOR: char = ',';

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub year: i16,
    pub title: String,
    pub authors: Vec<String>,
    pub author_ids: Vec<String>,
    pub journal: String,
}

impl Document {
    /// Encodes the record
    ///
    /// Journal names longer than `u16::MAX` bytes are truncated.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let title = self.title.as_bytes();
        let authors = join(&self.authors);
        let author_ids = join(&self.author_ids);
        let journal = truncate(&self.journal, u16::MAX as usize);
        if journal.len() < self.journal.len() {
            warn!("Journal name truncated to {} bytes", journal.len());
        }

        let mut data =
            Vec::with_capacity(HEADER_SIZE + title.len() + authors.len() + author_ids.len());
        let io = |e: std::io::Error| Error::io("encoding document", e);
        data.write_i16::<BigEndian>(self.year).map_err(io)?;
        data.write_u32::<BigEndian>(length(title.len(), "title")?)
            .map_err(io)?;
        data.write_u32::<BigEndian>(length(authors.len(), "authors")?)
            .map_err(io)?;
        data.write_u32::<BigEndian>(length(author_ids.len(), "author_ids")?)
            .map_err(io)?;
        data.write_u16::<BigEndian>(journal.len() as u16)
            .map_err(io)?;

        data.extend_from_slice(title);
        data.extend_from_slice(authors.as_bytes());
        data.extend_from_slice(author_ids.as_bytes());
        data.extend_from_slice(journal.as_bytes());
        Ok(data)
    }

    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() < HEADER_SIZE {
            return Err(Error::invalid_format(
                "document",
                format!("record too short ({} bytes)", record.len()),
            ));
        }

        let year = BigEndian::read_i16(&record[0..]);
        let title_len = BigEndian::read_u32(&record[2..]) as usize;
        let authors_len = BigEndian::read_u32(&record[6..]) as usize;
        let ids_len = BigEndian::read_u32(&record[10..]) as usize;
        let journal_len = BigEndian::read_u16(&record[14..]) as usize;

        let expected = HEADER_SIZE + title_len + authors_len + ids_len + journal_len;
        if expected != record.len() {
            return Err(Error::invalid_format(
                "document",
                format!("expected {} bytes, got {}", expected, record.len()),
            ));
        }

        let mut rest = &record[HEADER_SIZE..];
        let mut next = |len: usize| -> Result<String> {
            let (head, tail) = rest.split_at(len);
            rest = tail;
            String::from_utf8(head.to_vec())
                .map_err(|e| Error::invalid_format("document", e.to_string()))
        };

        let title = next(title_len)?;
        let authors = split(&next(authors_len)?);
        let author_ids = split(&next(ids_len)?);
        let journal = next(journal_len)?;

        Ok(Self {
            year,
            title,
            authors,
            author_ids,
            journal,
        })
    }
}

fn join(values: &[String]) -> String {
    let mut joined = String::new();
    for (ix, value) in values.iter().enumerate() {
        if ix > 0 {
            joined.push(SEPARATOR);
        }
        joined.push_str(value);
    }
    joined
}

fn split(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(SEPARATOR).map(str::to_string).collect()
    }
}

fn length(len: usize, field: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::invalid_arg(field, "field too long"))
}

/// Truncates on a character boundary
fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
