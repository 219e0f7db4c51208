//! External k-way merge of partial indexes
//!
//! The first pass merges the sorted partial vocabularies and records, for
//! each final term, which partial indexes contribute how many postings (the
//! `term_df` log). The second pass streams this log and copies the posting
//! blocks, so that at most one block is in memory at any time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::base::{Posting, POSTINGS_FILE, TERM_DF_LOG_FILE, VOCABULARY_FILE};
use crate::builder::partial::PartialIndexFiles;
use crate::error::{Error, IoContext, Result};
use crate::format::vocabulary::{VocabularyEntry, VocabularyReader};

/// Summary of a merge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub terms: usize,
    pub postings: u64,
}

/// Merges the partial indexes into `folder`'s vocabulary and postings files
///
/// The position of a partial index in `partials` is its source ID: postings
/// of a term shared by several partial indexes are written in that order.
pub fn merge(
    partials: &[PartialIndexFiles],
    folder: &Path,
    tmp: &Path,
    show_progress: bool,
) -> Result<MergeStats> {
    let vocabulary_path = folder.join(VOCABULARY_FILE);
    let postings_path = folder.join(POSTINGS_FILE);

    match partials {
        [] => Err(Error::invalid_arg("partials", "no partial index to merge")),
        [single] => {
            info!("Single partial index: rewriting the vocabulary");
            let stats = rewrite_vocabulary(&single.vocabulary, &vocabulary_path)?;
            fs::copy(&single.postings, &postings_path)
                .context(|| format!("copying {}", single.postings.display()))?;
            check_postings_size(&postings_path, stats.postings)?;
            Ok(stats)
        }
        _ => {
            info!("Merging {} partial indexes", partials.len());
            let term_df_path = tmp.join(TERM_DF_LOG_FILE);
            let stats = merge_vocabularies(partials, &vocabulary_path, &term_df_path)?;
            merge_postings(partials, &term_df_path, &postings_path, stats, show_progress)?;
            fs::remove_file(&term_df_path)
                .context(|| format!("removing {}", term_df_path.display()))?;
            Ok(stats)
        }
    }
}

/// Adds the running postings offset to a single partial vocabulary
fn rewrite_vocabulary(source: &Path, target: &Path) -> Result<MergeStats> {
    let context = || format!("writing {}", target.display());
    let mut writer = BufWriter::new(File::create(target).context(context)?);

    let mut stats = MergeStats::default();
    for entry in SortedVocabulary::open(source)? {
        let mut entry = entry?;
        entry.offset = stats.postings * Posting::SIZE as u64;
        entry.write(&mut writer).context(context)?;
        stats.terms += 1;
        stats.postings += entry.df as u64;
    }
    writer.flush().context(context)?;
    Ok(stats)
}

fn merge_vocabularies(
    partials: &[PartialIndexFiles],
    vocabulary_path: &Path,
    term_df_path: &Path,
) -> Result<MergeStats> {
    let mut readers = partials
        .iter()
        .map(|p| SortedVocabulary::open(&p.vocabulary))
        .collect::<Result<Vec<_>>>()?;

    // Min-heap on (term, source)
    let mut heap = BinaryHeap::new();
    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(entry) = reader.next() {
            let entry = entry?;
            heap.push(Reverse((entry.term, source, entry.df)));
        }
    }

    let vocabulary_context = || format!("writing {}", vocabulary_path.display());
    let term_df_context = || format!("writing {}", term_df_path.display());
    let mut vocabulary =
        BufWriter::new(File::create(vocabulary_path).context(vocabulary_context)?);
    let mut term_df = BufWriter::new(File::create(term_df_path).context(term_df_context)?);

    let mut stats = MergeStats::default();
    let mut current: Option<String> = None;
    let mut sources: Vec<(usize, u32)> = Vec::new();

    let mut flush = |term: String, sources: &mut Vec<(usize, u32)>, stats: &mut MergeStats| {
        sources.sort_unstable_by_key(|(source, _)| *source);
        let df: u32 = sources.iter().map(|(_, df)| *df).sum();

        VocabularyEntry {
            term,
            df,
            offset: stats.postings * Posting::SIZE as u64,
        }
        .write(&mut vocabulary)
        .context(vocabulary_context)?;

        let mut first = true;
        for (source, df) in sources.iter() {
            if !first {
                term_df.write_all(b" ").context(term_df_context)?;
            }
            write!(term_df, "{} {}", source, df).context(term_df_context)?;
            first = false;
        }
        term_df.write_all(b"\n").context(term_df_context)?;

        stats.terms += 1;
        stats.postings += df as u64;
        sources.clear();
        Ok::<(), Error>(())
    };

    while let Some(Reverse((term, source, df))) = heap.pop() {
        if let Some(entry) = readers[source].next() {
            let entry = entry?;
            heap.push(Reverse((entry.term, source, entry.df)));
        }

        if current.as_deref() != Some(term.as_str()) {
            if let Some(previous) = current.take() {
                flush(previous, &mut sources, &mut stats)?;
            }
            current = Some(term);
        }
        sources.push((source, df));
    }
    if let Some(previous) = current.take() {
        flush(previous, &mut sources, &mut stats)?;
    }
    drop(flush);

    vocabulary.flush().context(vocabulary_context)?;
    term_df.flush().context(term_df_context)?;

    info!(
        "Merged vocabulary: {} terms, {} postings",
        stats.terms, stats.postings
    );
    Ok(stats)
}

fn merge_postings(
    partials: &[PartialIndexFiles],
    term_df_path: &Path,
    postings_path: &Path,
    stats: MergeStats,
    show_progress: bool,
) -> Result<()> {
    let mut sources = partials
        .iter()
        .map(|p| {
            File::open(&p.postings)
                .map(BufReader::new)
                .context(|| format!("opening {}", p.postings.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let term_df = File::open(term_df_path)
        .map(BufReader::new)
        .context(|| format!("opening {}", term_df_path.display()))?;

    let context = || format!("writing {}", postings_path.display());
    let mut output = BufWriter::new(File::create(postings_path).context(context)?);

    let progress = if show_progress {
        ProgressBar::new(stats.terms as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(pb_style());

    let mut written = 0u64;
    for line in term_df.lines() {
        let line = line.context(|| format!("reading {}", term_df_path.display()))?;
        let mut fields = line.split_whitespace();
        while let Some(source) = fields.next() {
            let (source, df) = match (source.parse::<usize>(), fields.next().map(str::parse::<u64>)) {
                (Ok(source), Some(Ok(df))) if source < sources.len() => (source, df),
                _ => {
                    return Err(Error::invalid_format(
                        "term_df log",
                        format!("bad line {:?}", line),
                    ))
                }
            };

            let expected = df * Posting::SIZE as u64;
            let copied = std::io::copy(&mut (&mut sources[source]).take(expected), &mut output)
                .context(context)?;
            if copied != expected {
                return Err(Error::invalid_format(
                    "postings",
                    format!(
                        "{} is truncated ({} bytes copied out of {})",
                        partials[source].postings.display(),
                        copied,
                        expected
                    ),
                ));
            }
            written += copied;
        }
        progress.inc(1);
    }
    progress.finish();
    output.flush().context(context)?;

    if written != stats.postings * Posting::SIZE as u64 {
        return Err(Error::invalid_format(
            "postings",
            format!(
                "wrote {} bytes, expected {}",
                written,
                stats.postings * Posting::SIZE as u64
            ),
        ));
    }
    debug!("Merged postings: {} bytes", written);
    Ok(())
}

fn check_postings_size(path: &Path, postings: u64) -> Result<()> {
    let len = fs::metadata(path)
        .context(|| format!("reading metadata of {}", path.display()))?
        .len();
    if len != postings * Posting::SIZE as u64 {
        return Err(Error::invalid_format(
            "postings",
            format!(
                "{} has {} bytes, vocabulary expects {}",
                path.display(),
                len,
                postings * Posting::SIZE as u64
            ),
        ));
    }
    Ok(())
}

pub(crate) fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
}

/// Partial vocabulary reader that checks that terms are strictly increasing
struct SortedVocabulary {
    path: PathBuf,
    reader: VocabularyReader,
    last: Option<String>,
}

impl SortedVocabulary {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            reader: VocabularyReader::open(path, true)?,
            last: None,
        })
    }
}

impl Iterator for SortedVocabulary {
    type Item = Result<VocabularyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.reader.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        if let Some(last) = &self.last {
            if *last >= entry.term {
                return Some(Err(Error::invalid_format(
                    "partial vocabulary",
                    format!(
                        "{}: {:?} follows {:?}",
                        self.path.display(),
                        entry.term,
                        last
                    ),
                )));
            }
        }
        self.last = Some(entry.term.clone());
        Some(Ok(entry))
    }
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;
    use crate::base::TermFrequencies;
    use crate::builder::partial::PartialIndex;
    use crate::builder::tf_log::TermFrequencyLog;

    fn dump(dir: &Path, name: &str, documents: &[(u32, &[(&str, u32)])]) -> PartialIndexFiles {
        let mut log = TermFrequencyLog::create(&dir.join(format!("{}.log", name))).unwrap();
        let mut index = PartialIndex::new();
        for (docid, terms) in documents {
            let terms: TermFrequencies = terms.iter().map(|(t, f)| (t.to_string(), *f)).collect();
            index.add(*docid, &terms, &mut log).unwrap();
        }
        index.dump(&dir.join(name)).unwrap()
    }

    #[test]
    fn test_single() {
        let dir = TempDir::new().unwrap();
        let p = dump(dir.path(), "p0", &[(0, &[("a", 1), ("b", 2)]), (1, &[("b", 1)])]);

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let stats = merge(&[p], &out, dir.path(), false).unwrap();
        assert_eq!(stats, MergeStats { terms: 2, postings: 3 });
        assert_eq!(
            fs::read_to_string(out.join(VOCABULARY_FILE)).unwrap(),
            "a 1 0\nb 2 8\n"
        );
        assert_eq!(fs::metadata(out.join(POSTINGS_FILE)).unwrap().len(), 24);
    }

    #[test]
    fn test_multiple() {
        let dir = TempDir::new().unwrap();
        let p0 = dump(dir.path(), "p0", &[(0, &[("a", 1), ("c", 2)])]);
        let p1 = dump(dir.path(), "p1", &[(1, &[("b", 3), ("c", 4)])]);
        let p2 = dump(dir.path(), "p2", &[(2, &[("c", 5)])]);

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let stats = merge(&[p0, p1, p2], &out, dir.path(), false).unwrap();
        assert_eq!(stats, MergeStats { terms: 3, postings: 5 });
        assert_eq!(
            fs::read_to_string(out.join(VOCABULARY_FILE)).unwrap(),
            "a 1 0\nb 1 8\nc 3 16\n"
        );
        assert!(!dir.path().join(TERM_DF_LOG_FILE).exists());

        let data = fs::read(out.join(POSTINGS_FILE)).unwrap();
        let docids: Vec<u8> = data.chunks(8).map(|c| c[7]).collect();
        assert_eq!(docids, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_unsorted_vocabulary() {
        let dir = TempDir::new().unwrap();
        let p0 = dump(dir.path(), "p0", &[(0, &[("a", 1)])]);
        let p1 = dump(dir.path(), "p1", &[(1, &[("b", 1)])]);
        fs::write(&p1.vocabulary, "b 1\na 1\n").unwrap();

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        assert!(matches!(
            merge(&[p0, p1], &out, dir.path(), false),
            Err(Error::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_truncated_postings() {
        let dir = TempDir::new().unwrap();
        let p0 = dump(dir.path(), "p0", &[(0, &[("a", 1)])]);
        let p1 = dump(dir.path(), "p1", &[(1, &[("a", 1)])]);
        fs::write(&p1.postings, [0u8; 4]).unwrap();

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        assert!(matches!(
            merge(&[p0, p1], &out, dir.path(), false),
            Err(Error::InvalidFormat { .. })
        ));
    }
}
