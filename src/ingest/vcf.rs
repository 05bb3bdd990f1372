use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use super::{load_chromosome, IngestError};
use crate::alphabet::Alphabet;
use crate::graph::{NodeId, VariationGraph};

/// One VCF row after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    /// `CHROM` column.
    pub chromosome: String,
    /// 0-based position of the first base of `reference`.
    pub position: u64,
    /// Reference allele; empty for pure insertions.
    pub reference: Vec<u8>,
    /// Alternate alleles; an empty allele is a deletion.
    pub alternates: Vec<Vec<u8>>,
}

impl VariantRecord {
    /// Drop the leading bases shared by the reference and every alternate,
    /// advancing the position past them.
    fn trim_shared_prefix(&mut self) {
        let shared = (0..self.reference.len())
            .take_while(|&idx| {
                self.alternates
                    .iter()
                    .all(|alt| alt.get(idx) == Some(&self.reference[idx]))
            })
            .count();
        if shared == 0 {
            return;
        }
        self.reference.drain(..shared);
        for alt in &mut self.alternates {
            alt.drain(..shared);
        }
        self.position += shared as u64;
    }
}

/// Anything outside `ACGTN` and `,` marks a structural allele; a leading
/// `.` stands for "no bases".
fn is_structural(allele: &str) -> bool {
    !allele.starts_with('.')
        && allele
            .bytes()
            .any(|base| !matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N' | b','))
}

fn allele_bases(allele: &str) -> Vec<u8> {
    if allele.starts_with('.') {
        Vec::new()
    } else {
        allele.as_bytes().to_vec()
    }
}

fn vcf_error(line: usize, message: impl Into<String>) -> IngestError {
    IngestError::Vcf {
        line,
        message: message.into(),
    }
}

/// Read VCF rows, optionally keeping only `chromosome`. Structural rows are
/// skipped; positions are converted to 0-based and shared allele prefixes
/// trimmed.
pub fn read_variants<R: BufRead>(
    reader: R,
    chromosome: Option<&str>,
) -> Result<Vec<VariantRecord>, IngestError> {
    let mut variants = Vec::new();
    let mut structural = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let [chrom, pos, _id, reference, alternates, ..] = fields.as_slice() else {
            return Err(vcf_error(line_no, "expected at least 5 columns"));
        };
        if chromosome.is_some_and(|wanted| wanted != *chrom) {
            continue;
        }
        if is_structural(reference) || is_structural(alternates) {
            structural += 1;
            continue;
        }
        let position: u64 = pos
            .parse()
            .ok()
            .filter(|&position| position > 0)
            .ok_or_else(|| vcf_error(line_no, format!("invalid position {pos:?}")))?;

        let mut record = VariantRecord {
            chromosome: (*chrom).to_string(),
            position: position - 1,
            reference: allele_bases(reference),
            alternates: alternates.split(',').map(allele_bases).collect(),
        };
        record.trim_shared_prefix();
        variants.push(record);
    }

    info!(variants = variants.len(), structural, "read VCF");
    Ok(variants)
}

/// [`read_variants`] on a file.
pub fn load_variants<P: AsRef<Path>>(
    path: P,
    chromosome: Option<&str>,
) -> Result<Vec<VariantRecord>, IngestError> {
    let file = File::open(path.as_ref())?;
    read_variants(BufReader::new(file), chromosome)
}

/// Counters reported by [`build_from_variants`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Variants woven into the graph.
    pub added: usize,
    /// Variants skipped because they start inside an earlier one.
    pub skipped_overlap: usize,
}

/// Tracks the open ends the next node must connect to.
struct Frontier {
    reference: Option<NodeId>,
    variants: Vec<NodeId>,
    next_index: u32,
}

impl Frontier {
    fn connect(&self, graph: &mut VariationGraph, node: NodeId) -> Result<(), IngestError> {
        for from in self.reference.iter().chain(&self.variants) {
            graph.add_edge(*from, node)?;
        }
        Ok(())
    }

    fn push_reference(
        &mut self,
        graph: &mut VariationGraph,
        bases: &[u8],
    ) -> Result<NodeId, IngestError> {
        let node = if bases.is_empty() {
            graph.add_empty_node()
        } else {
            graph.add_node(bases)
        };
        graph.set_reference(node, self.next_index)?;
        self.next_index += 1;
        Ok(node)
    }
}

/// Weave `variants` into the linear `reference` sequence.
///
/// Each variant gets a reference node for its REF bases (taken from
/// `reference`) and a non-reference node per ALT allele; the bases between
/// variants become plain reference nodes.
pub fn build_from_variants(
    reference: &[u8],
    variants: &[VariantRecord],
    alphabet: &Alphabet,
) -> Result<(VariationGraph, BuildSummary), IngestError> {
    let mut sorted: Vec<&VariantRecord> = variants.iter().collect();
    sorted.sort_by_key(|variant| variant.position);

    let mut graph = VariationGraph::new(alphabet.clone());
    let mut summary = BuildSummary::default();
    let mut frontier = Frontier {
        reference: None,
        variants: Vec::new(),
        next_index: 0,
    };
    let mut position = 0usize;

    for variant in sorted {
        let start = variant.position as usize;
        if start < position {
            summary.skipped_overlap += 1;
            continue;
        }
        let end = start + variant.reference.len();
        if end > reference.len() {
            warn!(position = start, "reference sequence exhausted");
            break;
        }

        if start > position {
            let gap = frontier.push_reference(&mut graph, &reference[position..start])?;
            frontier.connect(&mut graph, gap)?;
            frontier.reference = Some(gap);
            frontier.variants.clear();
        }

        let bases = &reference[start..end];
        if !bases.eq_ignore_ascii_case(&variant.reference) {
            warn!(
                position = start,
                expected = %String::from_utf8_lossy(&variant.reference),
                found = %String::from_utf8_lossy(bases),
                "reference allele mismatch"
            );
        }
        let reference_node = frontier.push_reference(&mut graph, bases)?;
        frontier.connect(&mut graph, reference_node)?;

        let mut alternates = Vec::with_capacity(variant.alternates.len());
        for alt in &variant.alternates {
            let node = if alt.is_empty() {
                graph.add_empty_node()
            } else {
                graph.add_node(alt)
            };
            frontier.connect(&mut graph, node)?;
            alternates.push(node);
        }

        frontier.reference = Some(reference_node);
        frontier.variants = alternates;
        position = end;
        summary.added += 1;
    }

    if position < reference.len() {
        let tail = frontier.push_reference(&mut graph, &reference[position..])?;
        frontier.connect(&mut graph, tail)?;
    }

    info!(
        nodes = graph.len(),
        added = summary.added,
        skipped_overlap = summary.skipped_overlap,
        "built graph from variants"
    );
    Ok((graph, summary))
}

/// Read `chromosome` from a FASTA file and its variants from a VCF file, then
/// build the graph.
pub fn build_from_fasta_vcf<P: AsRef<Path>, Q: AsRef<Path>>(
    fasta: P,
    vcf: Q,
    chromosome: &str,
    alphabet: &Alphabet,
) -> Result<(VariationGraph, BuildSummary), IngestError> {
    let variants = load_variants(vcf, Some(chromosome))?;
    let reference = load_chromosome(fasta, chromosome)?;
    build_from_variants(&reference, &variants, alphabet)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VCF: &str = "##fileformat=VCFv4.2\n\
                       #CHROM\tPOS\tID\tREF\tALT\n\
                       1\t5\t.\tA\tG\n\
                       1\t9\t.\tTA\tT,TCA\n\
                       1\t12\t.\tC\t<DEL>\n\
                       2\t3\t.\tA\tC\n";

    #[test]
    fn reads_and_normalizes_rows() {
        let variants = read_variants(VCF.as_bytes(), Some("1")).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].position, 4);
        assert_eq!(variants[0].reference, b"A");
        assert_eq!(variants[0].alternates, vec![b"G".to_vec()]);
        // TA -> T,TCA shares the leading T
        assert_eq!(variants[1].position, 9);
        assert_eq!(variants[1].reference, b"A");
        assert_eq!(variants[1].alternates, vec![Vec::new(), b"CA".to_vec()]);

        assert_eq!(read_variants(VCF.as_bytes(), None).unwrap().len(), 3);
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(matches!(
            read_variants("1\t5\t.\tA\n".as_bytes(), None),
            Err(IngestError::Vcf { line: 1, .. })
        ));
        assert!(matches!(
            read_variants("1\t0\t.\tA\tC\n".as_bytes(), None),
            Err(IngestError::Vcf { line: 1, .. })
        ));
    }

    #[test]
    fn builds_bubbles_between_reference_runs() {
        let variants = read_variants(VCF.as_bytes(), Some("1")).unwrap();
        let (graph, summary) =
            build_from_variants(b"CCCCAGGGGATTTT", &variants, &Alphabet::default()).unwrap();
        assert_eq!(summary, BuildSummary { added: 2, skipped_overlap: 0 });

        let decoded: Vec<String> = graph
            .nodes()
            .iter()
            .map(|node| node.sequence().decode(graph.alphabet()))
            .collect();
        assert_eq!(decoded, ["CCCC", "A", "G", "GGGG", "A", "", "CA", "TTTT"]);

        let reference: Vec<bool> = graph.nodes().iter().map(|node| node.is_reference()).collect();
        assert_eq!(reference, [true, true, false, true, true, false, false, true]);
        assert_eq!(graph.node(7).unwrap().reference_index(), 4);
        assert_eq!(graph.node(0).unwrap().edges_out(), &[1, 2]);
        assert_eq!(graph.node(3).unwrap().edges_in(), &[1, 2]);
        assert_eq!(graph.node(7).unwrap().edges_in(), &[4, 5, 6]);
    }

    #[test]
    fn overlapping_variants_are_skipped() {
        let variants = vec![
            VariantRecord {
                chromosome: "1".into(),
                position: 0,
                reference: b"ACG".to_vec(),
                alternates: vec![b"A".to_vec()],
            },
            VariantRecord {
                chromosome: "1".into(),
                position: 1,
                reference: b"C".to_vec(),
                alternates: vec![b"T".to_vec()],
            },
        ];
        let (graph, summary) = build_from_variants(b"ACGT", &variants, &Alphabet::default()).unwrap();
        assert_eq!(summary, BuildSummary { added: 1, skipped_overlap: 1 });
        // ACG, A, then the T tail fed by both
        assert_eq!(graph.len(), 3);
        assert!(graph.node(0).unwrap().edges_in().is_empty());
        assert_eq!(graph.node(2).unwrap().edges_in(), &[0, 1]);
    }
}
