//! # Variant signatures over genome variation graphs
//!
//! `varsig` stores a genome variation graph with 2-bit packed node
//! sequences, enumerates every k-mer along paths that cross a bounded number
//! of variant nodes, and picks the k-mer windows that best tell a variant
//! allele from its reference.
//!
//! ## Pipeline
//!
//! 1. **Ingest**: GFA, or FASTA + VCF, into a [`VariationGraph`]
//! 2. **Compress**: collapse unbranched reference chains
//! 3. **Enumerate**: bounded DFS with bit-buffer k-mer assembly ([`KmerFinder`])
//! 4. **Index**: count k-mers genome-wide ([`FrequencyIndex`])
//! 5. **Select**: rarest window pair per variant ([`VariantWindow`])
//!
//! ## Usage Example
//!
//! ```
//! use varsig::{KmerFinder, VariationGraph};
//!
//! let mut graph = VariationGraph::default();
//! let head = graph.add_node(b"ACGTA");
//! let reference = graph.add_node(b"C");
//! let variant = graph.add_node(b"G");
//! let tail = graph.add_node(b"TTAC");
//! graph.set_reference(head, 0)?;
//! graph.set_reference(reference, 1)?;
//! graph.set_reference(tail, 2)?;
//! for (from, to) in [(head, reference), (head, variant), (reference, tail), (variant, tail)] {
//!     graph.add_edge(from, to)?;
//! }
//!
//! let mut finder = KmerFinder::with_k(&graph, 3, 1)?;
//! finder.find()?;
//! let signature = finder.find_variant_signatures(reference, variant)?;
//! assert!(signature.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod alphabet; // 2-bit codec and packed sequences
pub mod graph; // Variation graph, compression, persistence
pub mod ingest; // GFA / FASTA / VCF readers
pub mod kmer; // Enumeration and signature search

pub use alphabet::{Alphabet, AlphabetError, PackedSequence};
pub use graph::{CompressionOutcome, GraphError, Node, NodeId, VariationGraph};
pub use ingest::IngestError;
pub use kmer::{
    FinderConfig, FoundKmers, FrequencyIndex, KmerFinder, KmerFinderError, KmerWindow,
    OutputMode, SignatureStrategy, VariantWindow,
};
