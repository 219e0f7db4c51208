//! Citation graph and PageRank
//!
//! While documents are indexed, their citations are appended to a text log.
//! Once the document store is final, the log is turned into a compact
//! binary graph (per document: out-degree and in-neighbours, as internal
//! IDs), loaded in memory, and iterated with the power method. The scores
//! are stored in the document metadata, followed by the author ranks.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use derivative::Derivative;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::base::DocId;
use crate::builder::merge::pb_style;
use crate::error::{Error, IoContext, Result};
use crate::store::DocumentStore;

#[derive(Derivative, Clone, Debug, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct PageRankOptions {
    #[derivative(Default(value = "0.85"))]
    pub damping: f64,

    /// Iterations stop once no score moves by more than this
    #[derivative(Default(value = "1e-10"))]
    pub threshold: f64,

    #[derivative(Default(value = "1000"))]
    pub max_iterations: usize,
}

/// A node of the citation graph
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PagerankNode {
    pub out_degree: u32,
    pub score: f64,
    /// Documents citing this one
    pub in_neighbors: Vec<DocId>,
}

/// Text log of the citations of each document (one line per document)
pub struct CitationLog {
    writer: BufWriter<File>,
}

impl CitationLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(
                File::create(path).context(|| format!("creating {}", path.display()))?,
            ),
        })
    }

    pub fn append(&mut self, out_citations: &[String], in_citations: &[String]) -> Result<()> {
        let context = || "writing the citation log".to_string();
        write_ids(&mut self.writer, out_citations).context(context)?;
        self.writer.write_all(b"\t").context(context)?;
        write_ids(&mut self.writer, in_citations).context(context)?;
        self.writer.write_all(b"\n").context(context)
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .context(|| "flushing the citation log".to_string())
    }
}

fn write_ids<W: Write>(writer: &mut W, ids: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for id in ids.iter() {
        if id.is_empty() || id.contains(char::is_whitespace) {
            warn!("Ignoring citation {:?}", id);
            continue;
        }
        if !first {
            writer.write_all(b" ")?;
        }
        writer.write_all(id.as_bytes())?;
        first = false;
    }
    Ok(())
}

/// Keeps the citations that are neither self references, duplicates nor
/// outside the corpus
fn filter_citations(docid: DocId, ids: &str, id_map: &HashMap<String, DocId>) -> Vec<DocId> {
    let mut seen = HashSet::new();
    ids.split_whitespace()
        .filter_map(|id| id_map.get(id).copied())
        .filter(|&other| other != docid && seen.insert(other))
        .collect()
}

/// Writes the binary graph: `out_degree:u32, in_count:u32, in_ids:u32*`
/// per document, in internal ID order. Returns the number of in-edges.
pub fn build_graph(
    citation_log: &Path,
    id_map: &HashMap<String, DocId>,
    documents: DocId,
    graph: &Path,
) -> Result<u64> {
    let input = File::open(citation_log)
        .map(BufReader::new)
        .context(|| format!("opening {}", citation_log.display()))?;
    let context = || format!("writing {}", graph.display());
    let mut output = BufWriter::new(File::create(graph).context(context)?);

    let mut docid: DocId = 0;
    let mut edges = 0u64;
    for line in input.lines() {
        let line = line.context(|| format!("reading {}", citation_log.display()))?;
        if docid >= documents {
            return Err(Error::invalid_format(
                "citation log",
                format!("more lines than documents ({})", documents),
            ));
        }
        let (out_ids, in_ids) = line.split_once('\t').ok_or_else(|| {
            Error::invalid_format("citation log", format!("bad line for document {}", docid))
        })?;

        let out_degree = filter_citations(docid, out_ids, id_map).len() as u32;
        let in_neighbors = filter_citations(docid, in_ids, id_map);

        output.write_u32::<BigEndian>(out_degree).context(context)?;
        output
            .write_u32::<BigEndian>(in_neighbors.len() as u32)
            .context(context)?;
        for id in in_neighbors.iter() {
            output.write_u32::<BigEndian>(*id).context(context)?;
        }
        edges += in_neighbors.len() as u64;
        docid += 1;
    }

    if docid != documents {
        return Err(Error::invalid_format(
            "citation log",
            format!("{} lines for {} documents", docid, documents),
        ));
    }
    output.flush().context(context)?;
    debug!("Citation graph: {} documents, {} edges", documents, edges);
    Ok(edges)
}

pub fn load_graph(graph: &Path, documents: DocId) -> Result<Vec<PagerankNode>> {
    let context = || format!("reading {}", graph.display());
    let mut input = File::open(graph).map(BufReader::new).context(context)?;

    let mut nodes = Vec::with_capacity(documents as usize);
    for _ in 0..documents {
        let out_degree = input.read_u32::<BigEndian>().context(context)?;
        let count = input.read_u32::<BigEndian>().context(context)?;
        let mut in_neighbors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = input.read_u32::<BigEndian>().context(context)?;
            if id >= documents {
                return Err(Error::invalid_format(
                    "citation graph",
                    format!("document {} out of range", id),
                ));
            }
            in_neighbors.push(id);
        }
        nodes.push(PagerankNode {
            out_degree,
            score: 0.,
            in_neighbors,
        });
    }
    Ok(nodes)
}

pub struct PageRank {
    options: PageRankOptions,
}

impl PageRank {
    pub fn new(options: PageRankOptions) -> Self {
        Self { options }
    }

    /// Sets every score to `1/N`
    pub fn init(&self, nodes: &mut [PagerankNode]) {
        let initial = 1. / nodes.len() as f64;
        for node in nodes.iter_mut() {
            node.score = initial;
        }
    }

    /// One synchronous power iteration; returns the largest score change
    ///
    /// The score mass of sink nodes (no out-edge) is spread uniformly.
    pub fn iterate(&self, nodes: &mut [PagerankNode], scratch: &mut Vec<f64>) -> f64 {
        let n = nodes.len() as f64;
        let d = self.options.damping;

        let sink: f64 = nodes
            .iter()
            .filter(|node| node.out_degree == 0)
            .map(|node| node.score)
            .sum::<f64>()
            / n;

        scratch.clear();
        scratch.extend(nodes.iter().map(|node| {
            let incoming: f64 = node
                .in_neighbors
                .iter()
                .map(|&j| &nodes[j as usize])
                .filter(|citing| citing.out_degree > 0)
                .map(|citing| citing.score / citing.out_degree as f64)
                .sum();
            d * (sink + incoming) + (1. - d) / n
        }));

        let mut max_delta = 0f64;
        for (node, &score) in nodes.iter_mut().zip(scratch.iter()) {
            max_delta = max_delta.max((score - node.score).abs());
            node.score = score;
        }
        max_delta
    }

    /// Iterates until no score changes by more than the threshold
    ///
    /// This is a heuristic stopping rule: the scores approximate the
    /// stationary distribution, they are not an exact fixed point.
    pub fn run(&self, nodes: &mut [PagerankNode], show_progress: bool) -> Result<usize> {
        if nodes.is_empty() {
            return Ok(0);
        }
        self.init(nodes);

        let progress = if show_progress {
            ProgressBar::new(self.options.max_iterations as u64)
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(pb_style());

        let mut scratch = Vec::with_capacity(nodes.len());
        for iteration in 1..=self.options.max_iterations {
            let delta = self.iterate(nodes, &mut scratch);
            progress.inc(1);
            progress.set_message(&format!("delta {:.3e}", delta));
            debug!("PageRank iteration {}: max delta {}", iteration, delta);
            if delta <= self.options.threshold {
                progress.finish();
                info!("PageRank converged after {} iterations", iteration);
                return Ok(iteration);
            }
        }
        progress.finish();
        Err(Error::NotConverged {
            iterations: self.options.max_iterations,
        })
    }
}

/// Computes the PageRank of all documents and the average author ranks
pub fn compute_pagerank(
    citation_log: &Path,
    graph: &Path,
    store: &mut DocumentStore,
    options: &PageRankOptions,
    show_progress: bool,
) -> Result<usize> {
    let documents = store.count();
    info!("Computing PageRank over {} documents", documents);

    let mut id_map = HashMap::with_capacity(documents as usize);
    for docid in 0..documents {
        id_map.entry(store.meta(docid)?.id).or_insert(docid);
    }
    build_graph(citation_log, &id_map, documents, graph)?;
    drop(id_map);

    let mut nodes = load_graph(graph, documents)?;
    let iterations = PageRank::new(options.clone()).run(&mut nodes, show_progress)?;

    for (docid, node) in nodes.iter().enumerate() {
        store.set_pagerank(docid as DocId, node.score)?;
    }
    store.flush()?;

    compute_author_ranks(store)?;
    Ok(iterations)
}

/// The rank of an author is the sum of the PageRank of their papers; each
/// document stores the mean rank of its authors
pub fn compute_author_ranks(store: &mut DocumentStore) -> Result<usize> {
    let documents = store.count();

    let mut ranks: HashMap<String, f64> = HashMap::new();
    for docid in 0..documents {
        let meta = store.meta(docid)?;
        for author in store.document(&meta)?.author_ids {
            if !author.is_empty() {
                *ranks.entry(author).or_insert(0.) += meta.pagerank;
            }
        }
    }

    for docid in 0..documents {
        let meta = store.meta(docid)?;
        let authors: Vec<f64> = store
            .document(&meta)?
            .author_ids
            .iter()
            .filter_map(|author| ranks.get(author).copied())
            .collect();
        let average = if authors.is_empty() {
            0.
        } else {
            authors.iter().sum::<f64>() / authors.len() as f64
        };
        store.set_author_rank(docid, average)?;
    }
    store.flush()?;

    info!("Computed the rank of {} authors", ranks.len());
    Ok(ranks.len())
}

#[cfg(test)]
mod tests {
    use ntest::{assert_about_eq, timeout};
    use temp_dir::TempDir;

    use super::*;

    fn node(out_degree: u32, in_neighbors: &[DocId]) -> PagerankNode {
        PagerankNode {
            out_degree,
            score: 0.,
            in_neighbors: in_neighbors.to_vec(),
        }
    }

    fn total(nodes: &[PagerankNode]) -> f64 {
        nodes.iter().map(|n| n.score).sum()
    }

    #[test]
    fn test_conservation() {
        // 0 -> 1, 0 -> 2, 1 -> 2, 2 -> 0
        let mut nodes = vec![node(2, &[2]), node(1, &[0]), node(1, &[0, 1])];
        let pagerank = PageRank::new(PageRankOptions::default());
        pagerank.init(&mut nodes);

        let mut scratch = Vec::new();
        for _ in 0..20 {
            pagerank.iterate(&mut nodes, &mut scratch);
            assert_about_eq!(total(&nodes), 1., 1e-12);
        }
    }

    #[test]
    #[timeout(10000)]
    fn test_run_with_sink() {
        // 0 -> 1, 1 -> 2, 2 is a sink
        let mut nodes = vec![node(1, &[]), node(1, &[0]), node(0, &[1])];
        let iterations = PageRank::new(PageRankOptions::default())
            .run(&mut nodes, false)
            .unwrap();
        assert!(iterations > 1);
        assert_about_eq!(total(&nodes), 1., 1e-9);
        assert!(nodes[2].score > nodes[1].score);
        assert!(nodes[1].score > nodes[0].score);
    }

    #[test]
    fn test_not_converged() {
        let mut nodes = vec![node(1, &[1]), node(1, &[0]), node(0, &[0])];
        let options = PageRankOptions {
            threshold: 0.,
            max_iterations: 2,
            ..Default::default()
        };
        assert!(matches!(
            PageRank::new(options).run(&mut nodes, false),
            Err(Error::NotConverged { iterations: 2 })
        ));
    }

    #[test]
    fn test_graph() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("citations.log");
        let graph_path = dir.path().join("graph.bin");

        let ids = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut log = CitationLog::create(&log_path).unwrap();
        // Self reference, duplicate and unknown citations are dropped
        log.append(&ids(&["b", "b", "a", "zz"]), &ids(&["c"])).unwrap();
        log.append(&ids(&[]), &ids(&["a", "a"])).unwrap();
        log.append(&ids(&["a"]), &ids(&[])).unwrap();
        log.finish().unwrap();

        let id_map = HashMap::from([
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2),
        ]);
        assert_eq!(build_graph(&log_path, &id_map, 3, &graph_path).unwrap(), 2);

        let nodes = load_graph(&graph_path, 3).unwrap();
        assert_eq!(nodes[0], node(1, &[2]));
        assert_eq!(nodes[1], node(0, &[0]));
        assert_eq!(nodes[2], node(1, &[]));
    }
}
