//! Fixed-size document metadata records
//!
//! | field          | type  | offset |
//! |----------------|-------|--------|
//! | external id    | 40 B  | 0      |
//! | weight (norm)  | f64   | 40     |
//! | max tf         | u32   | 48     |
//! | length         | u32   | 52     |
//! | pagerank       | f64   | 56     |
//! | avg author rank| f64   | 64     |
//! | document size  | u32   | 72     |
//! | document offset| u64   | 76     |
//!
//! The record of document `id` starts at `id * RECORD_SIZE`.

use std::fmt;
use std::io::Write;

use byteorder::{BigEndian, ByteOrder};

use crate::base::DocId;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentMeta {
    /// External identifier (at most [`DocumentMeta::ID_SIZE`] bytes)
    pub id: String,
    /// Document vector norm, divided by the maximum term frequency
    pub weight: f64,
    pub max_tf: u32,
    /// Number of tokens
    pub length: u32,
    pub pagerank: f64,
    pub author_rank: f64,
    pub doc_size: u32,
    pub doc_offset: u64,
}

impl DocumentMeta {
    pub const ID_SIZE: usize = 40;
    pub const RECORD_SIZE: usize = 84;

    const WEIGHT: usize = 40;
    const MAX_TF: usize = 48;
    const LENGTH: usize = 52;
    const PAGERANK: usize = 56;
    const AUTHOR_RANK: usize = 64;
    const DOC_SIZE: usize = 72;
    const DOC_OFFSET: usize = 76;

    /// Offset of the record in the metadata file
    #[inline]
    pub fn position(docid: DocId) -> u64 {
        docid as u64 * Self::RECORD_SIZE as u64
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let id = self.id.as_bytes();
        if id.len() > Self::ID_SIZE {
            return Err(Error::invalid_arg(
                "id",
                format!("{:?} is longer than {} bytes", self.id, Self::ID_SIZE),
            ));
        }

        let mut record = [0u8; Self::RECORD_SIZE];
        record[..id.len()].copy_from_slice(id);
        Self::set_weight(&mut record, self.weight, self.max_tf);
        BigEndian::write_u32(&mut record[Self::LENGTH..], self.length);
        Self::set_pagerank(&mut record, self.pagerank);
        Self::set_author_rank(&mut record, self.author_rank);
        BigEndian::write_u32(&mut record[Self::DOC_SIZE..], self.doc_size);
        BigEndian::write_u64(&mut record[Self::DOC_OFFSET..], self.doc_offset);

        writer
            .write_all(&record)
            .map_err(|e| Error::io("writing document metadata", e))
    }

    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() != Self::RECORD_SIZE {
            return Err(Error::invalid_format(
                "document metadata",
                format!("record has {} bytes", record.len()),
            ));
        }

        let id_end = record[..Self::ID_SIZE]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::ID_SIZE);
        let id = std::str::from_utf8(&record[..id_end])
            .map_err(|e| Error::invalid_format("document metadata", e.to_string()))?
            .to_string();

        Ok(Self {
            id,
            weight: BigEndian::read_f64(&record[Self::WEIGHT..]),
            max_tf: BigEndian::read_u32(&record[Self::MAX_TF..]),
            length: BigEndian::read_u32(&record[Self::LENGTH..]),
            pagerank: BigEndian::read_f64(&record[Self::PAGERANK..]),
            author_rank: BigEndian::read_f64(&record[Self::AUTHOR_RANK..]),
            doc_size: BigEndian::read_u32(&record[Self::DOC_SIZE..]),
            doc_offset: BigEndian::read_u64(&record[Self::DOC_OFFSET..]),
        })
    }

    /// Reads only the document size of an encoded record
    pub fn decode_doc_size(record: &[u8]) -> u32 {
        BigEndian::read_u32(&record[Self::DOC_SIZE..])
    }

    // In-place updates of an encoded record

    pub fn set_weight(record: &mut [u8], weight: f64, max_tf: u32) {
        BigEndian::write_f64(&mut record[Self::WEIGHT..], weight);
        BigEndian::write_u32(&mut record[Self::MAX_TF..], max_tf);
    }

    pub fn set_pagerank(record: &mut [u8], pagerank: f64) {
        BigEndian::write_f64(&mut record[Self::PAGERANK..], pagerank);
    }

    pub fn set_author_rank(record: &mut [u8], author_rank: f64) {
        BigEndian::write_f64(&mut record[Self::AUTHOR_RANK..], author_rank);
    }
}

impl fmt::Display for DocumentMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (len: {}, weight: {}, max_tf: {}, pagerank: {})",
            self.id, self.length, self.weight, self.max_tf, self.pagerank
        )
    }
}
