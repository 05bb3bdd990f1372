//! Enumerator configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::KmerFinderError;
use crate::alphabet::MAX_KMER_LEN;

/// Where recorded k-mers go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputMode {
    /// Flat result table (kmer, node, start, position).
    #[default]
    Table,
    /// One text line per record on the stream writer.
    Stream,
    /// Buckets keyed by (node, start position, k-mer position).
    Windows,
}

/// How a signature window pair is chosen around a variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignatureStrategy {
    /// Pick the rarest window on each side independently.
    #[default]
    Unaligned,
    /// Pair windows anchored at the same offset from the variant boundary.
    Aligned,
}

/// Parameters of a [`KmerFinder`](super::KmerFinder).
///
/// ```
/// use varsig::kmer::{FinderConfig, OutputMode};
///
/// let config = FinderConfig::new(31, 4)?
///     .with_output(OutputMode::Stream)
///     .with_origin_only(true);
/// assert_eq!(config.k(), 31);
/// # Ok::<(), varsig::kmer::KmerFinderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FinderConfig {
    k: usize,
    max_variant_nodes: usize,
    output: OutputMode,
    origin_only: bool,
    start_positions: bool,
    kmer_positions: bool,
    signature_strategy: SignatureStrategy,
    minimize_overlap: bool,
}

impl FinderConfig {
    /// Validate `k` (1 to 32 bases) and set the variant-node budget.
    pub fn new(k: usize, max_variant_nodes: usize) -> Result<Self, KmerFinderError> {
        if k == 0 || k > MAX_KMER_LEN {
            return Err(KmerFinderError::InvalidK { k });
        }
        Ok(Self {
            k,
            max_variant_nodes,
            output: OutputMode::Table,
            origin_only: false,
            start_positions: false,
            kmer_positions: false,
            signature_strategy: SignatureStrategy::Unaligned,
            minimize_overlap: false,
        })
    }

    /// Select the output sink.
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Record each k-mer only for the node it starts in.
    pub fn with_origin_only(mut self, origin_only: bool) -> Self {
        self.origin_only = origin_only;
        self
    }

    /// Keep the start-position column of the result table.
    pub fn with_start_positions(mut self, enabled: bool) -> Self {
        self.start_positions = enabled;
        self
    }

    /// Keep the k-mer-position column of the result table.
    pub fn with_kmer_positions(mut self, enabled: bool) -> Self {
        self.kmer_positions = enabled;
        self
    }

    /// Select the signature search strategy.
    pub fn with_signature_strategy(mut self, strategy: SignatureStrategy) -> Self {
        self.signature_strategy = strategy;
        self
    }

    /// Penalize signature windows that share k-mers with the other allele.
    pub fn with_minimize_overlap(mut self, enabled: bool) -> Self {
        self.minimize_overlap = enabled;
        self
    }

    /// K-mer length in bases.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Maximum number of non-reference nodes on one path.
    pub fn max_variant_nodes(&self) -> usize {
        self.max_variant_nodes
    }

    /// Output sink.
    pub fn output(&self) -> OutputMode {
        self.output
    }

    /// Whether only the origin node is recorded.
    pub fn origin_only(&self) -> bool {
        self.origin_only
    }

    /// Whether start positions are kept.
    pub fn start_positions(&self) -> bool {
        self.start_positions
    }

    /// Whether k-mer positions are kept.
    pub fn kmer_positions(&self) -> bool {
        self.kmer_positions
    }

    /// Signature search strategy.
    pub fn signature_strategy(&self) -> SignatureStrategy {
        self.signature_strategy
    }

    /// Whether signature search minimizes overlap.
    pub fn minimize_overlap(&self) -> bool {
        self.minimize_overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_is_validated() {
        assert!(matches!(
            FinderConfig::new(0, 1),
            Err(KmerFinderError::InvalidK { k: 0 })
        ));
        assert!(matches!(
            FinderConfig::new(33, 1),
            Err(KmerFinderError::InvalidK { k: 33 })
        ));
        assert!(FinderConfig::new(32, 0).is_ok());
    }

    #[test]
    fn defaults_and_builders() {
        let config = FinderConfig::new(5, 3).unwrap();
        assert_eq!(config.output(), OutputMode::Table);
        assert_eq!(config.signature_strategy(), SignatureStrategy::Unaligned);
        assert!(!config.origin_only());
        assert!(!config.minimize_overlap());

        let config = config
            .with_output(OutputMode::Windows)
            .with_signature_strategy(SignatureStrategy::Aligned)
            .with_minimize_overlap(true)
            .with_start_positions(true);
        assert_eq!(config.output(), OutputMode::Windows);
        assert_eq!(config.signature_strategy(), SignatureStrategy::Aligned);
        assert!(config.minimize_overlap());
        assert!(config.start_positions());
        assert!(!config.kmer_positions());
        assert_eq!(config.max_variant_nodes(), 3);
    }
}
