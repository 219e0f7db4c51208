//! `key=value` description of a built index

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, IoContext, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexMeta {
    pub use_stemmer: bool,
    pub use_stopwords: bool,
    /// Number of indexed articles
    pub articles: u32,
    /// Average document length (in tokens)
    pub avgdl: f64,
    /// Build time (seconds since the epoch)
    pub timestamp: u64,
    pub pagerank_damping: f64,
    pub pagerank_threshold: f64,
}

impl IndexMeta {
    pub fn write(&self, path: &Path) -> Result<()> {
        let context = || format!("writing {}", path.display());
        let mut writer = BufWriter::new(File::create(path).context(context)?);
        writeln!(writer, "use_stemmer={}", self.use_stemmer).context(context)?;
        writeln!(writer, "use_stopwords={}", self.use_stopwords).context(context)?;
        writeln!(writer, "articles={}", self.articles).context(context)?;
        writeln!(writer, "avgdl={}", self.avgdl).context(context)?;
        writeln!(writer, "timestamp={}", self.timestamp).context(context)?;
        writeln!(writer, "pagerank_damping={}", self.pagerank_damping).context(context)?;
        writeln!(writer, "pagerank_threshold={}", self.pagerank_threshold).context(context)?;
        writer.flush().context(context)
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingPath(path.to_path_buf()));
        }
        let file = File::open(path).context(|| format!("opening {}", path.display()))?;

        let mut meta = IndexMeta::default();
        let mut seen = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.context(|| format!("reading {}", path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::invalid_format("index meta", format!("not a key=value line: {:?}", line))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "use_stemmer" => meta.use_stemmer = parse(key, value)?,
                "use_stopwords" => meta.use_stopwords = parse(key, value)?,
                "articles" => meta.articles = parse(key, value)?,
                "avgdl" => meta.avgdl = parse(key, value)?,
                "timestamp" => meta.timestamp = parse(key, value)?,
                "pagerank_damping" => meta.pagerank_damping = parse(key, value)?,
                "pagerank_threshold" => meta.pagerank_threshold = parse(key, value)?,
                _ => {
                    return Err(Error::invalid_format(
                        "index meta",
                        format!("unknown key {}", key),
                    ))
                }
            }
            seen.push(key.to_string());
        }

        for key in ["articles", "avgdl"] {
            if !seen.iter().any(|k| k == key) {
                return Err(Error::invalid_format(
                    "index meta",
                    format!("missing key {}", key),
                ));
            }
        }
        Ok(meta)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid_format("index meta", format!("invalid value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;

    #[test]
    fn test_write_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index_meta.txt");

        let meta = IndexMeta {
            use_stemmer: true,
            use_stopwords: false,
            articles: 1234,
            avgdl: 87.25,
            timestamp: 1_700_000_000,
            pagerank_damping: 0.85,
            pagerank_threshold: 1e-8,
        };
        meta.write(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("articles=1234\n"));
        assert!(content.contains("use_stemmer=true\n"));

        assert_eq!(IndexMeta::read(&path).unwrap(), meta);
    }

    #[test]
    fn test_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index_meta.txt");

        std::fs::write(&path, "articles=12\n").unwrap();
        assert!(IndexMeta::read(&path).is_err());

        std::fs::write(&path, "articles=x\navgdl=1\n").unwrap();
        assert!(IndexMeta::read(&path).is_err());

        assert!(matches!(
            IndexMeta::read(&dir.path().join("missing")),
            Err(Error::MissingPath(_))
        ));
    }
}
