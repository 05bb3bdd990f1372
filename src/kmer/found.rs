//! Result containers filled by the enumerator.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::alphabet::reverse_kmer;
use crate::graph::NodeId;

/// One record of the flat result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FoundKmer {
    /// Right-justified k-mer value.
    pub kmer: u64,
    /// Node the record belongs to.
    pub node: NodeId,
    /// Offset of the k-mer's first base inside `node` (origin records only).
    pub start_position: Option<u32>,
    /// Index inside the k-mer where `node`'s first base sits.
    pub kmer_position: Option<u16>,
}

/// Flat result table. The position columns exist only when enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundKmers {
    kmers: Vec<u64>,
    nodes: Vec<NodeId>,
    start_positions: Option<Vec<u32>>,
    kmer_positions: Option<Vec<u16>>,
}

impl FoundKmers {
    pub(crate) fn with_capacity(capacity: usize, start_positions: bool, kmer_positions: bool) -> Self {
        Self {
            kmers: Vec::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            start_positions: start_positions.then(|| Vec::with_capacity(capacity)),
            kmer_positions: kmer_positions.then(|| Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn push(&mut self, kmer: u64, node: NodeId, start_position: u32, kmer_position: u16) {
        self.kmers.push(kmer);
        self.nodes.push(node);
        if let Some(starts) = &mut self.start_positions {
            starts.push(start_position);
        }
        if let Some(positions) = &mut self.kmer_positions {
            positions.push(kmer_position);
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    /// Returns `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    /// K-mer column.
    pub fn kmers(&self) -> &[u64] {
        &self.kmers
    }

    /// Node column.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Start-position column, if kept.
    pub fn start_positions(&self) -> Option<&[u32]> {
        self.start_positions.as_deref()
    }

    /// K-mer-position column, if kept.
    pub fn kmer_positions(&self) -> Option<&[u16]> {
        self.kmer_positions.as_deref()
    }

    /// Number of records holding `kmer`.
    pub fn count(&self, kmer: u64) -> usize {
        self.kmers.iter().filter(|&&found| found == kmer).count()
    }

    /// Iterate over records.
    pub fn iter(&self) -> impl Iterator<Item = FoundKmer> + '_ {
        (0..self.len()).map(move |idx| FoundKmer {
            kmer: self.kmers[idx],
            node: self.nodes[idx],
            start_position: self.start_positions.as_ref().map(|col| col[idx]),
            kmer_position: self.kmer_positions.as_ref().map(|col| col[idx]),
        })
    }

    pub(crate) fn reverse(&mut self, k: usize) {
        for kmer in &mut self.kmers {
            *kmer = reverse_kmer(*kmer, k);
        }
    }
}

/// All k-mers observed at one alignment slot of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KmerWindow {
    /// Node the window belongs to.
    pub node: NodeId,
    /// Offset of the k-mers' first base inside `node`.
    pub start_position: u32,
    /// Index inside the k-mers where `node`'s first base sits.
    pub kmer_position: u16,
    /// K-mers in the order they were found.
    pub kmers: Vec<u64>,
    /// Highest frequency-index count among `kmers`.
    pub max_frequency: u32,
}

impl KmerWindow {
    /// Bases of the k-mer that precede the node.
    pub fn bases_before(&self) -> i64 {
        i64::from(self.kmer_position) - i64::from(self.start_position)
    }

    /// Bases of the k-mer that follow the node (negative when the k-mer ends
    /// inside it).
    pub fn bases_after(&self, k: usize, node_len: usize) -> i64 {
        k as i64 + i64::from(self.start_position) - node_len as i64 - i64::from(self.kmer_position)
    }
}

/// Window buckets, found by linear scan. Capacity grows by half.
#[derive(Debug, Clone, Default)]
pub(crate) struct WindowTable {
    windows: Vec<KmerWindow>,
}

impl WindowTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            windows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(
        &mut self,
        node: NodeId,
        kmer: u64,
        start_position: u32,
        kmer_position: u16,
        frequency: u32,
    ) {
        if let Some(window) = self.windows.iter_mut().find(|window| {
            window.node == node
                && window.start_position == start_position
                && window.kmer_position == kmer_position
        }) {
            window.kmers.push(kmer);
            window.max_frequency = window.max_frequency.max(frequency);
            return;
        }
        if self.windows.len() == self.windows.capacity() {
            let extra = (self.windows.capacity() / 2).max(1);
            self.windows.reserve_exact(extra);
        }
        self.windows.push(KmerWindow {
            node,
            start_position,
            kmer_position,
            kmers: vec![kmer],
            max_frequency: frequency,
        });
    }

    pub(crate) fn as_slice(&self) -> &[KmerWindow] {
        &self.windows
    }
}

/// Genome-wide k-mer occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyIndex {
    counts: HashMap<u64, u32>,
}

impl FrequencyIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty index with room for `capacity` distinct k-mers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: HashMap::with_capacity(capacity),
        }
    }

    /// Count for `kmer`, 0 when unseen.
    pub fn get(&self, kmer: u64) -> u32 {
        self.counts.get(&kmer).copied().unwrap_or(0)
    }

    /// Overwrite the count for `kmer`.
    pub fn insert(&mut self, kmer: u64, count: u32) {
        self.counts.insert(kmer, count);
    }

    /// Add one occurrence of `kmer`.
    pub fn increment(&mut self, kmer: u64) {
        let count = self.counts.entry(kmer).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Number of distinct k-mers.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` when no k-mer is indexed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over `(kmer, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.counts.iter().map(|(&kmer, &count)| (kmer, count))
    }
}

impl FromIterator<(u64, u32)> for FrequencyIndex {
    fn from_iter<I: IntoIterator<Item = (u64, u32)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}
