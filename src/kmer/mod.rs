//! K-mer enumeration over a [`VariationGraph`].
//!
//! A [`KmerFinder`] walks every path of the graph that crosses at most
//! `max_variant_nodes` non-reference nodes and records each k-mer once per
//! node on the path. The same traversal serves four entry points:
//!
//! * [`KmerFinder::find`] enumerates from every node;
//! * [`KmerFinder::set_node_filter`] restricts recording to one node;
//! * [`KmerFinder::find_kmers_spanning_node`] walks predecessors backwards
//!   until the k-mers touching a node are covered;
//! * [`OutputMode::Windows`] groups records into [`KmerWindow`] buckets for
//!   signature search (see [`KmerFinder::find_variant_signatures`]).

mod config;
mod found;
mod signature;
mod traversal;

pub use config::{FinderConfig, OutputMode, SignatureStrategy};
pub use found::{FoundKmer, FoundKmers, FrequencyIndex, KmerWindow};
pub use signature::VariantWindow;

use std::io::Write;
use std::sync::Arc;

use bitvec::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::{NodeId, VariationGraph};
use found::WindowTable;
use traversal::{Output, Recorder, StreamSink, Traversal};

/// Errors raised by the enumerator.
#[derive(Debug, Error)]
pub enum KmerFinderError {
    /// `k` outside `1..=32`.
    #[error("k must be between 1 and 32, got {k}")]
    InvalidK {
        /// Rejected value.
        k: usize,
    },
    /// A node id is out of range.
    #[error("node {node} does not exist")]
    NodeNotFound {
        /// Offending id.
        node: NodeId,
    },
    /// Writing to the stream output failed.
    #[error("failed to write k-mer stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Bounded k-mer enumerator bound to one graph.
///
/// Not reentrant: results live in the finder and are replaced by every
/// top-level call. Use one finder per thread.
#[derive(Debug)]
pub struct KmerFinder<'g> {
    graph: &'g VariationGraph,
    config: FinderConfig,
    filter: Option<NodeId>,
    frequency_index: Arc<FrequencyIndex>,
    found: FoundKmers,
    windows: WindowTable,
    stream: StreamSink,
}

impl<'g> KmerFinder<'g> {
    /// Create a finder; stream output goes to stdout until redirected.
    pub fn new(graph: &'g VariationGraph, config: FinderConfig) -> Self {
        let mut finder = Self {
            graph,
            config,
            filter: None,
            frequency_index: Arc::default(),
            found: FoundKmers::default(),
            windows: WindowTable::default(),
            stream: StreamSink::new(Box::new(std::io::stdout())),
        };
        finder.reset();
        finder
    }

    /// Shorthand for a table-output finder with default flags.
    pub fn with_k(
        graph: &'g VariationGraph,
        k: usize,
        max_variant_nodes: usize,
    ) -> Result<Self, KmerFinderError> {
        Ok(Self::new(graph, FinderConfig::new(k, max_variant_nodes)?))
    }

    /// Graph being enumerated.
    pub fn graph(&self) -> &'g VariationGraph {
        self.graph
    }

    /// Active configuration.
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Drop all results and reallocate the result tables.
    pub fn reset(&mut self) {
        self.found = FoundKmers::with_capacity(
            self.graph.len(),
            self.config.start_positions(),
            self.config.kmer_positions(),
        );
        self.windows = WindowTable::with_capacity(self.config.k() * 2);
    }

    /// Record only k-mers attributed to `node` (or everything for `None`).
    pub fn set_node_filter(&mut self, node: Option<NodeId>) {
        self.filter = node;
    }

    /// Redirect [`OutputMode::Stream`] records to `writer`.
    pub fn set_stream_writer<W: Write + Send + 'static>(&mut self, writer: W) {
        self.stream = StreamSink::new(Box::new(writer));
    }

    /// Flat result table.
    pub fn found_kmers(&self) -> &FoundKmers {
        &self.found
    }

    /// Window buckets from the last windowed enumeration.
    pub fn windows(&self) -> &[KmerWindow] {
        self.windows.as_slice()
    }

    /// Frequency index attached to this finder.
    pub fn frequency_index(&self) -> &FrequencyIndex {
        &self.frequency_index
    }

    /// Attach a genome-wide frequency index used to rate windows.
    pub fn set_frequency_index(&mut self, index: FrequencyIndex) {
        self.frequency_index = Arc::new(index);
    }

    fn traversal(&mut self) -> Traversal<'g, '_> {
        let output = match self.config.output() {
            OutputMode::Table => Output::Table(&mut self.found),
            OutputMode::Stream => Output::Stream(&mut self.stream),
            OutputMode::Windows => Output::Windows(&mut self.windows),
        };
        let recorder = Recorder {
            output,
            filter: self.filter,
            frequencies: &self.frequency_index,
        };
        Traversal::new(self.graph, &self.config, recorder)
    }

    fn finish_stream(&mut self) -> Result<(), KmerFinderError> {
        if self.config.output() == OutputMode::Stream {
            self.stream.finish()?;
        }
        Ok(())
    }

    fn check_node(&self, node: NodeId) -> Result<(), KmerFinderError> {
        if (node as usize) < self.graph.len() {
            Ok(())
        } else {
            Err(KmerFinderError::NodeNotFound { node })
        }
    }

    /// Enumerate k-mers from every non-empty node. Returns the number of
    /// records that passed the node filter.
    pub fn find(&mut self) -> Result<u64, KmerFinderError> {
        self.reset();
        let node_count = self.graph.len() as NodeId;
        let mut traversal = self.traversal();
        let found: u64 = (0..node_count).map(|id| traversal.scan_origin(id)).sum();
        drop(traversal);
        debug!(k = self.config.k(), found, "enumerated graph");
        self.finish_stream()?;
        Ok(found)
    }

    /// Enumerate the k-mers that start in `node`, appending to the results.
    pub fn find_kmers_from_node(&mut self, node: NodeId) -> Result<u64, KmerFinderError> {
        self.check_node(node)?;
        let found = self.traversal().scan_origin(node);
        self.finish_stream()?;
        Ok(found)
    }

    /// Enumerate every k-mer that involves `center`, walking backwards over
    /// predecessors until they stop contributing.
    pub fn find_kmers_spanning_node(&mut self, center: NodeId) -> Result<u64, KmerFinderError> {
        self.check_node(center)?;
        self.reset();
        let found = self.span(center);
        self.finish_stream()?;
        Ok(found)
    }

    fn span(&mut self, center: NodeId) -> u64 {
        let graph = self.graph;
        let limit = self.config.k() * self.config.k();
        let previous_filter = self.filter.replace(center);

        let mut visited = bitvec![0; graph.len()];
        let mut stack = vec![center];
        let mut found_any = false;
        let mut visits = 0usize;
        let mut total = 0;

        let mut traversal = self.traversal();
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                continue;
            }
            visited.set(id as usize, true);
            visits += 1;

            let node = &graph.nodes()[id as usize];
            if !node.is_empty() {
                let found = traversal.scan_origin(id);
                total += found;
                if found > 0 {
                    found_any = true;
                } else if found_any {
                    continue;
                }
            }
            if !found_any && visits > limit {
                warn!(center, visits, "no k-mers found spanning node");
                break;
            }
            stack.extend(
                node.edges_in()
                    .iter()
                    .copied()
                    .filter(|&pred| !visited[pred as usize]),
            );
        }
        drop(traversal);

        self.filter = previous_filter;
        total
    }

    /// Enumerate the k-mers around a reference/variant node pair, with
    /// position columns enabled. Reference records come first.
    pub fn find_kmers_for_variant(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<u64, KmerFinderError> {
        self.check_node(reference)?;
        self.check_node(variant)?;
        let saved = self.config.clone();
        self.config = saved
            .clone()
            .with_start_positions(true)
            .with_kmer_positions(true);
        self.reset();
        let found = self.span(reference) + self.span(variant);
        self.config = saved;
        self.finish_stream()?;
        Ok(found)
    }

    /// Count occurrences of every k-mer in the flat result table.
    pub fn build_frequency_index(&self) -> FrequencyIndex {
        let mut index = FrequencyIndex::with_capacity(self.found.len() / (128 / self.config.k()));
        for &kmer in self.found.kmers() {
            index.increment(kmer);
        }
        debug!(distinct = index.len(), "built frequency index");
        index
    }

    /// Reverse the base order of every recorded k-mer.
    pub fn reverse_found_kmers(&mut self) {
        self.found.reverse(self.config.k());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> VariationGraph {
        let mut graph = VariationGraph::default();
        let head = graph.add_node(b"ACGTA");
        let left = graph.add_node(b"C");
        let right = graph.add_node(b"G");
        let tail = graph.add_node(b"TTAC");
        for (id, index) in [(head, 0), (left, 1), (tail, 2)] {
            graph.set_reference(id, index).unwrap();
        }
        graph.add_edge(head, left).unwrap();
        graph.add_edge(head, right).unwrap();
        graph.add_edge(left, tail).unwrap();
        graph.add_edge(right, tail).unwrap();
        graph
    }

    #[test]
    fn find_counts_records() {
        let graph = diamond();
        let mut finder = KmerFinder::with_k(&graph, 3, 1).unwrap();
        let found = finder.find().unwrap();
        assert_eq!(found as usize, finder.found_kmers().len());
        let acg = graph.alphabet().hash_min(b"ACG").unwrap();
        assert_eq!(finder.found_kmers().count(acg), 1);
        // TAC, TAG on head + branch; ACT, AGT on head + branch + tail
        let tac = graph.alphabet().hash_min(b"TAC").unwrap();
        assert_eq!(finder.found_kmers().count(tac), 3);
    }

    #[test]
    fn zero_budget_skips_variant_paths() {
        let graph = diamond();
        let mut finder = KmerFinder::with_k(&graph, 3, 0).unwrap();
        finder.find().unwrap();
        let tag = graph.alphabet().hash_min(b"TAG").unwrap();
        let tac = graph.alphabet().hash_min(b"TAC").unwrap();
        assert_eq!(finder.found_kmers().count(tag), 0);
        assert!(finder.found_kmers().count(tac) > 0);
        assert!(finder.found_kmers().nodes().iter().all(|&node| node != 2));
    }

    #[test]
    fn node_filter_restricts_records() {
        let graph = diamond();
        let mut finder = KmerFinder::with_k(&graph, 3, 1).unwrap();
        finder.set_node_filter(Some(1));
        let found = finder.find().unwrap();
        assert!(found > 0);
        assert!(finder.found_kmers().nodes().iter().all(|&node| node == 1));
    }

    #[test]
    fn spanning_search_matches_filtered_full_enumeration() {
        let graph = diamond();
        let mut full = KmerFinder::with_k(&graph, 4, 2).unwrap();
        full.set_node_filter(Some(3));
        full.find().unwrap();
        let mut expected = full.found_kmers().kmers().to_vec();
        expected.sort_unstable();

        let mut spanning = KmerFinder::with_k(&graph, 4, 2).unwrap();
        spanning.find_kmers_spanning_node(3).unwrap();
        let mut actual = spanning.found_kmers().kmers().to_vec();
        actual.sort_unstable();
        assert_eq!(actual, expected);
    }

    #[test]
    fn frequency_index_and_reverse() {
        let graph = diamond();
        let mut finder = KmerFinder::with_k(&graph, 3, 1).unwrap();
        finder.find().unwrap();
        let index = finder.build_frequency_index();
        let tac = graph.alphabet().hash_min(b"TAC").unwrap();
        assert_eq!(index.get(tac), 3);

        finder.reverse_found_kmers();
        let cat = graph.alphabet().hash_min(b"CAT").unwrap();
        assert_eq!(finder.found_kmers().count(cat), 3);
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let graph = diamond();
        let mut finder = KmerFinder::with_k(&graph, 3, 1).unwrap();
        assert!(matches!(
            finder.find_kmers_spanning_node(42),
            Err(KmerFinderError::NodeNotFound { node: 42 })
        ));
        assert!(matches!(
            KmerFinder::with_k(&graph, 40, 1),
            Err(KmerFinderError::InvalidK { k: 40 })
        ));
    }
}
