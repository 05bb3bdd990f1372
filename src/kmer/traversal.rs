//! Bounded depth-first k-mer assembly.
//!
//! The origin node is scanned with a 64-bit sliding buffer; its last `k - 1`
//! bases are then carried into every successor, where an extension buffer
//! collects the leading bases of each node on the current path. The path
//! stack and the variant budget are restored by [`PathStep`] on every exit.

use std::io::Write;
use std::ops::{Deref, DerefMut};

use super::found::{FoundKmers, FrequencyIndex, WindowTable};
use super::FinderConfig;
use crate::alphabet::{kmer_mask, shl, shr, BITS_PER_BASE, MAX_KMER_LEN};
use crate::graph::{Node, NodeId, VariationGraph};

/// Text sink for [`OutputMode::Stream`](super::OutputMode::Stream).
pub(crate) struct StreamSink {
    writer: Box<dyn Write + Send>,
    error: Option<std::io::Error>,
}

impl StreamSink {
    pub(crate) fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    fn write(&mut self, kmer: u64, node: NodeId, start_position: u32, kmer_position: u16) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = writeln!(
            self.writer,
            "{kmer}\t{node}:{start_position}:{kmer_position}"
        ) {
            self.error = Some(err);
        }
    }

    /// Flush and surface the first write failure, if any.
    pub(crate) fn finish(&mut self) -> std::io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()
    }
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("failed", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

/// Destination of accepted records.
pub(crate) enum Output<'s> {
    Table(&'s mut FoundKmers),
    Stream(&'s mut StreamSink),
    Windows(&'s mut WindowTable),
}

/// Applies the node filter and forwards records to the selected output.
pub(crate) struct Recorder<'s> {
    pub(crate) output: Output<'s>,
    pub(crate) filter: Option<NodeId>,
    pub(crate) frequencies: &'s FrequencyIndex,
}

impl Recorder<'_> {
    #[inline]
    fn record(&mut self, kmer: u64, node: NodeId, start_position: u32, kmer_position: u16) -> u64 {
        if self.filter.is_some_and(|filter| filter != node) {
            return 0;
        }
        match &mut self.output {
            Output::Table(table) => table.push(kmer, node, start_position, kmer_position),
            Output::Stream(stream) => stream.write(kmer, node, start_position, kmer_position),
            Output::Windows(windows) => {
                let frequency = self.frequencies.get(kmer);
                windows.insert(node, kmer, start_position, kmer_position, frequency);
            }
        }
        1
    }
}

#[derive(Debug, Clone, Copy)]
struct PathEntry {
    node: NodeId,
    /// Index inside the k-mer where this node's first base sits.
    kmer_position: u16,
    variant: bool,
}

/// Per-enumeration traversal state.
pub(crate) struct Traversal<'g, 's> {
    graph: &'g VariationGraph,
    k: usize,
    mask: u64,
    max_variant_nodes: usize,
    origin_only: bool,
    variants_on_path: usize,
    path: Vec<PathEntry>,
    /// Tail of the origin node, right-aligned.
    origin_buffer: u64,
    /// Start offset of the next k-mer inside the origin node.
    origin_start: u32,
    /// Bases gathered from downstream nodes, left-aligned.
    ext_buffer: u64,
    recorder: Recorder<'s>,
}

/// Scoped path entry; dropping it pops the node and returns its budget.
struct PathStep<'t, 'g, 's> {
    traversal: &'t mut Traversal<'g, 's>,
}

impl<'g, 's> Deref for PathStep<'_, 'g, 's> {
    type Target = Traversal<'g, 's>;

    fn deref(&self) -> &Self::Target {
        self.traversal
    }
}

impl DerefMut for PathStep<'_, '_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.traversal
    }
}

impl Drop for PathStep<'_, '_, '_> {
    fn drop(&mut self) {
        if let Some(entry) = self.traversal.path.pop() {
            if entry.variant {
                self.traversal.variants_on_path -= 1;
            }
        }
    }
}

impl<'g, 's> Traversal<'g, 's> {
    pub(crate) fn new(graph: &'g VariationGraph, config: &FinderConfig, recorder: Recorder<'s>) -> Self {
        let k = config.k();
        Self {
            graph,
            k,
            mask: kmer_mask(k),
            max_variant_nodes: config.max_variant_nodes(),
            origin_only: config.origin_only(),
            variants_on_path: 0,
            path: Vec::with_capacity(k * 4),
            origin_buffer: 0,
            origin_start: 0,
            ext_buffer: 0,
            recorder,
        }
    }

    /// Push `node` onto the path unless that would exceed the variant budget.
    fn enter(&mut self, node: NodeId, kmer_position: u16) -> Option<PathStep<'_, 'g, 's>> {
        let variant = !self.graph.nodes()[node as usize].is_reference();
        if variant {
            if self.variants_on_path >= self.max_variant_nodes {
                return None;
            }
            self.variants_on_path += 1;
        }
        self.path.push(PathEntry {
            node,
            kmer_position,
            variant,
        });
        Some(PathStep { traversal: self })
    }

    /// Record every k-mer that starts in `origin`. Returns the number of
    /// records that passed the node filter.
    pub(crate) fn scan_origin(&mut self, origin: NodeId) -> u64 {
        let graph = self.graph;
        let node = &graph.nodes()[origin as usize];
        if node.is_empty() {
            return 0;
        }
        match self.enter(origin, 0) {
            Some(mut step) => step.scan(origin, node),
            None => 0,
        }
    }

    fn scan(&mut self, origin: NodeId, node: &'g Node) -> u64 {
        let k = self.k;
        let words = node.sequence().words();
        let refill = BITS_PER_BASE * (MAX_KMER_LEN + 1 - k) as u32;

        let mut found = 0;
        let mut buffer = node.sequence().word(0);
        let mut remaining = node.len();
        let mut filled = k.min(remaining);
        let mut word_idx = 1;
        let mut bit_pos = 0u32;
        self.origin_start = 0;

        if filled == k {
            filled -= 1;
            while filled < remaining {
                filled += 1;
                let kmer = shr(buffer, 64 - BITS_PER_BASE * filled as u32) & self.mask;
                found += self.recorder.record(kmer, origin, self.origin_start, 0);
                self.origin_start += 1;

                // Buffer full: drop the consumed bases and pull in the next ones.
                if filled == MAX_KMER_LEN && word_idx < words.len() {
                    buffer = shl(buffer, refill) | shr(shl(words[word_idx], bit_pos), 64 - refill);
                    bit_pos += refill;
                    if bit_pos > 64 {
                        word_idx += 1;
                        if word_idx < words.len() {
                            bit_pos -= 64;
                            buffer |= shr(words[word_idx], 64 - bit_pos);
                        }
                    } else if bit_pos == 64 {
                        word_idx += 1;
                        bit_pos = 0;
                    }
                    filled = k - 1;
                    remaining -= MAX_KMER_LEN + 1 - k;
                }
            }
        }

        self.origin_buffer = shr(buffer, 64 - BITS_PER_BASE * filled as u32);
        let kmer_len = filled.min(k - 1);
        for &next in node.edges_out() {
            found += self.extend(next, kmer_len, 0);
        }
        found
    }

    fn extend(&mut self, id: NodeId, kmer_len: usize, ext_len: usize) -> u64 {
        let graph = self.graph;
        let node = &graph.nodes()[id as usize];
        match self.enter(id, (kmer_len + ext_len) as u16) {
            Some(mut step) => step.fold(node, kmer_len, ext_len),
            None => 0,
        }
    }

    /// Fold `node`'s leading bases into the extension buffer, record the
    /// k-mers that become complete and recurse while fewer than `k - 1`
    /// extension bases are known.
    fn fold(&mut self, node: &'g Node, kmer_len: usize, mut ext_len: usize) -> u64 {
        let k = self.k;
        let mut found = 0;

        if !node.is_empty() {
            let head = node.sequence().word(0);
            self.ext_buffer = if ext_len == 0 {
                head
            } else {
                let shift = BITS_PER_BASE * ext_len as u32;
                (self.ext_buffer & shl(u64::MAX, 64 - shift)) | shr(head, shift)
            };

            let available = (ext_len + node.len()).min(k - 1);
            if kmer_len + available >= k {
                ext_len = ext_len.max(k - kmer_len - 1);
                while ext_len < available {
                    ext_len += 1;
                    let shift = BITS_PER_BASE * ext_len as u32;
                    let kmer = (shl(self.origin_buffer, shift) | shr(self.ext_buffer, 64 - shift))
                        & self.mask;
                    found += self.record_path(kmer, (kmer_len + ext_len).saturating_sub(k));
                }
            } else {
                ext_len = available;
            }
        }

        if ext_len < k - 1 {
            for &next in node.edges_out() {
                found += self.extend(next, kmer_len, ext_len);
            }
        }
        found
    }

    /// Record `kmer` for every node on the path (or the origin only).
    /// `overshoot` counts origin bases that slid out of the window.
    fn record_path(&mut self, kmer: u64, overshoot: usize) -> u64 {
        let entries = if self.origin_only { 1 } else { self.path.len() };
        let mut found = 0;
        for idx in 0..entries {
            let entry = self.path[idx];
            let (start, position) = if idx == 0 {
                (self.origin_start + overshoot as u32, 0)
            } else {
                (0, entry.kmer_position - overshoot as u16)
            };
            found += self.recorder.record(kmer, entry.node, start, position);
        }
        found
    }
}
