//! Builders that turn text inputs into a [`VariationGraph`](crate::graph::VariationGraph).
//!
//! * [`read_gfa`] loads a GFA v1 segment graph whose first path line is the
//!   reference.
//! * [`read_chromosome`] and [`read_variants`] load one FASTA chromosome and
//!   the matching VCF rows; [`build_from_variants`] weaves them into a graph.

mod fasta;
mod gfa;
mod vcf;

pub use fasta::{load_chromosome, read_chromosome};
pub use gfa::{load_gfa, read_gfa};
pub use vcf::{
    build_from_fasta_vcf, build_from_variants, load_variants, read_variants, BuildSummary,
    VariantRecord,
};

use thiserror::Error;

use crate::graph::GraphError;

/// Errors raised while reading inputs or building a graph from them.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed GFA input.
    #[error("GFA line {line}: {message}")]
    Gfa {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
    /// Malformed VCF input.
    #[error("VCF line {line}: {message}")]
    Vcf {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
    /// Malformed FASTA input.
    #[error("FASTA parse error: {0}")]
    Fasta(#[from] needletail::errors::ParseError),
    /// The FASTA file has no record with the requested name.
    #[error("chromosome {0} not found")]
    ChromosomeNotFound(String),
    /// The assembled graph was rejected.
    #[error(transparent)]
    Graph(#[from] GraphError),
}
