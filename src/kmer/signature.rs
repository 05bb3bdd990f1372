//! Signature window search around a reference/variant node pair.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KmerFinder, KmerFinderError, KmerWindow, OutputMode, SignatureStrategy};
use crate::alphabet::{reverse_kmer, Alphabet, AlphabetError};
use crate::graph::NodeId;

/// Reference and variant k-mer sets chosen to tell two alleles apart.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantWindow {
    reference_kmers: Vec<u64>,
    variant_kmers: Vec<u64>,
    max_frequency: u32,
}

impl VariantWindow {
    /// Pair two windows; the frequency is the sum of both maxima.
    pub fn new(reference: &KmerWindow, variant: &KmerWindow) -> Self {
        Self {
            reference_kmers: reference.kmers.clone(),
            variant_kmers: variant.kmers.clone(),
            max_frequency: reference.max_frequency.saturating_add(variant.max_frequency),
        }
    }

    /// K-mers observed on the reference side.
    pub fn reference_kmers(&self) -> &[u64] {
        &self.reference_kmers
    }

    /// K-mers observed on the variant side.
    pub fn variant_kmers(&self) -> &[u64] {
        &self.variant_kmers
    }

    /// Combined maximum frequency of both sides.
    pub fn max_frequency(&self) -> u32 {
        self.max_frequency
    }

    /// Copy with every k-mer in reversed base order.
    pub fn reversed(&self, k: usize) -> Self {
        let reverse = |kmers: &[u64]| kmers.iter().map(|&kmer| reverse_kmer(kmer, k)).collect();
        Self {
            reference_kmers: reverse(&self.reference_kmers),
            variant_kmers: reverse(&self.variant_kmers),
            max_frequency: self.max_frequency,
        }
    }

    /// Render both sides as base strings.
    pub fn decode(
        &self,
        alphabet: &Alphabet,
        k: usize,
    ) -> Result<(Vec<String>, Vec<String>), AlphabetError> {
        let decode = |kmers: &[u64]| {
            kmers
                .iter()
                .map(|&kmer| alphabet.decode(kmer, k))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok((decode(&self.reference_kmers)?, decode(&self.variant_kmers)?))
    }
}

/// Number of identical pairs between two k-mer lists.
fn shared_kmers(left: &[u64], right: &[u64]) -> u32 {
    left.iter()
        .map(|kmer| right.iter().filter(|&other| other == kmer).count() as u32)
        .sum()
}

/// Index of the candidate with the lowest `(overlap, frequency)`. Earlier
/// candidates win ties.
fn rarest<I>(candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut best: Option<(usize, u32, u32)> = None;
    for (idx, (overlap, frequency)) in candidates.into_iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, best_overlap, best_frequency)) => {
                overlap < best_overlap || (overlap == best_overlap && frequency < best_frequency)
            }
        };
        if better {
            best = Some((idx, overlap, frequency));
        }
    }
    best.map(|(idx, _, _)| idx)
}

/// Overlap of candidate `idx` against every other aligned candidate.
fn aligned_overlap(windows: &[VariantWindow], idx: usize) -> u32 {
    let window = &windows[idx];
    windows
        .iter()
        .enumerate()
        .filter(|&(other, _)| other != idx)
        .map(|(_, other)| {
            shared_kmers(&window.reference_kmers, &other.variant_kmers)
                + shared_kmers(&window.variant_kmers, &other.reference_kmers)
        })
        .sum()
}

impl<'g> KmerFinder<'g> {
    /// Build a windowed finder with this finder's k, budget and signature
    /// settings. The frequency index is built from the current results first
    /// when none is attached.
    pub fn create_window_finder(&mut self) -> KmerFinder<'g> {
        if self.frequency_index.is_empty() {
            self.frequency_index = Arc::new(self.build_frequency_index());
        }
        let config = self
            .config
            .clone()
            .with_output(OutputMode::Windows)
            .with_origin_only(false);
        let mut finder = KmerFinder::new(self.graph, config);
        finder.frequency_index = Arc::clone(&self.frequency_index);
        finder
    }

    /// Windows on each side of the pair: reference windows precede the first
    /// window owned by `variant`.
    fn split_windows(&self, variant: NodeId) -> Option<(&[KmerWindow], &[KmerWindow])> {
        let windows = self.windows();
        let split = windows
            .iter()
            .position(|window| window.node == variant)
            .unwrap_or(windows.len());
        if split == 0 || split == windows.len() {
            return None;
        }
        Some(windows.split_at(split))
    }

    /// Run windowed enumeration for the pair on this finder, then list the
    /// window pairs anchored at the same offset from the variant boundary.
    fn aligned_windows(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Vec<VariantWindow>, KmerFinderError> {
        self.find_kmers_for_variant(reference, variant)?;
        let k = self.config.k();
        let nodes = self.graph.nodes();
        let reference_len = nodes[reference as usize].len();
        let variant_len = nodes[variant as usize].len();
        let Some((reference_windows, variant_windows)) = self.split_windows(variant) else {
            warn!(reference, variant, "no windows found for variant");
            return Ok(Vec::new());
        };

        let mut pairs = Vec::new();
        for ref_window in reference_windows {
            for var_window in variant_windows {
                let aligned = ref_window.bases_before() == var_window.bases_before()
                    || ref_window.bases_after(k, reference_len)
                        == var_window.bases_after(k, variant_len);
                if aligned {
                    pairs.push(VariantWindow::new(ref_window, var_window));
                }
            }
        }
        Ok(pairs)
    }

    /// Every aligned reference/variant window pair around the locus.
    pub fn find_windows_for_variant(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Vec<VariantWindow>, KmerFinderError> {
        self.create_window_finder().aligned_windows(reference, variant)
    }

    /// The most discriminating window pair for the locus, or `None` when one
    /// side produced no windows.
    pub fn find_variant_signatures(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Option<VariantWindow>, KmerFinderError> {
        let mut window_finder = self.create_window_finder();
        window_finder.signatures(reference, variant)
    }

    /// Signatures for many loci, reusing one window finder.
    pub fn find_signatures_for_variants(
        &mut self,
        pairs: &[(NodeId, NodeId)],
    ) -> Result<Vec<Option<VariantWindow>>, KmerFinderError> {
        let mut window_finder = self.create_window_finder();
        let signatures = pairs
            .iter()
            .map(|&(reference, variant)| window_finder.signatures(reference, variant))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            loci = pairs.len(),
            resolved = signatures.iter().flatten().count(),
            "signature search finished"
        );
        Ok(signatures)
    }

    fn signatures(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Option<VariantWindow>, KmerFinderError> {
        match self.config.signature_strategy() {
            SignatureStrategy::Unaligned => self.unaligned_signature(reference, variant),
            SignatureStrategy::Aligned => self.aligned_signature(reference, variant),
        }
    }

    fn aligned_signature(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Option<VariantWindow>, KmerFinderError> {
        let mut windows = self.aligned_windows(reference, variant)?;
        let minimize_overlap = self.config.minimize_overlap();
        let best = rarest((0..windows.len()).map(|idx| {
            let overlap = if minimize_overlap {
                aligned_overlap(&windows, idx)
            } else {
                0
            };
            (overlap, windows[idx].max_frequency)
        }));
        Ok(best.map(|idx| windows.swap_remove(idx)))
    }

    fn unaligned_signature(
        &mut self,
        reference: NodeId,
        variant: NodeId,
    ) -> Result<Option<VariantWindow>, KmerFinderError> {
        self.find_kmers_for_variant(reference, variant)?;
        let Some((reference_windows, variant_windows)) = self.split_windows(variant) else {
            warn!(reference, variant, "no windows found for variant");
            return Ok(None);
        };

        let minimize_overlap = self.config.minimize_overlap();
        let pick = |side: &[KmerWindow], other: &[KmerWindow]| {
            rarest(side.iter().map(|window| {
                let overlap = if minimize_overlap {
                    other
                        .iter()
                        .map(|theirs| shared_kmers(&window.kmers, &theirs.kmers))
                        .sum::<u32>()
                } else {
                    0
                };
                (overlap, window.max_frequency)
            }))
        };

        let signature = pick(reference_windows, variant_windows)
            .zip(pick(variant_windows, reference_windows))
            .map(|(ref_idx, var_idx)| {
                VariantWindow::new(&reference_windows[ref_idx], &variant_windows[var_idx])
            });
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(node: NodeId, kmers: &[u64], max_frequency: u32) -> KmerWindow {
        KmerWindow {
            node,
            start_position: 0,
            kmer_position: 0,
            kmers: kmers.to_vec(),
            max_frequency,
        }
    }

    #[test]
    fn variant_window_sums_frequencies() {
        let pair = VariantWindow::new(&window(1, &[1, 2], 4), &window(2, &[3], 5));
        assert_eq!(pair.reference_kmers(), &[1, 2]);
        assert_eq!(pair.variant_kmers(), &[3]);
        assert_eq!(pair.max_frequency(), 9);
    }

    #[test]
    fn reversed_and_decoded() {
        let alphabet = Alphabet::default();
        let acg = alphabet.hash_min(b"ACG").unwrap();
        let tta = alphabet.hash_min(b"TTA").unwrap();
        let pair = VariantWindow::new(&window(1, &[acg], 1), &window(2, &[tta], 1));
        let (reference, variant) = pair.reversed(3).decode(&alphabet, 3).unwrap();
        assert_eq!(reference, ["GCA"]);
        assert_eq!(variant, ["ATT"]);
    }

    #[test]
    fn rarest_prefers_overlap_then_frequency() {
        assert_eq!(rarest([(1, 1), (0, 5), (0, 3), (0, 3)]), Some(2));
        assert_eq!(rarest([(0, 2), (0, 2)]), Some(0));
        assert_eq!(rarest(std::iter::empty()), None);
    }

    #[test]
    fn overlap_counts_identical_pairs() {
        assert_eq!(shared_kmers(&[1, 2, 2], &[2, 3, 2]), 4);
        let windows = [
            VariantWindow::new(&window(1, &[1, 2], 0), &window(2, &[3], 0)),
            VariantWindow::new(&window(1, &[3], 0), &window(2, &[1], 0)),
            VariantWindow::new(&window(1, &[4], 0), &window(2, &[5], 0)),
        ];
        assert_eq!(aligned_overlap(&windows, 0), 2);
        assert_eq!(aligned_overlap(&windows, 1), 2);
        assert_eq!(aligned_overlap(&windows, 2), 0);
    }
}
