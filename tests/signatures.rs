//! Signature window selection around the fixture bubbles

mod common;

use common::{branching_graph, kmer};
use test_case::test_case;
use varsig::{
    FinderConfig, FrequencyIndex, KmerFinder, NodeId, SignatureStrategy, VariantWindow,
    VariationGraph,
};

const K: usize = 5;

/// Every k-mer around the locus at count 7, then the given overrides.
fn index_with(graph: &VariationGraph, reference: NodeId, variant: NodeId, overrides: &[(&str, u32)]) -> FrequencyIndex {
    let mut finder = KmerFinder::with_k(graph, K, 31).expect("valid k");
    finder
        .find_kmers_for_variant(reference, variant)
        .expect("variant enumeration succeeds");
    let mut index: FrequencyIndex = finder
        .found_kmers()
        .kmers()
        .iter()
        .map(|&value| (value, 7))
        .collect();
    for &(literal, count) in overrides {
        index.insert(kmer(graph, literal), count);
    }
    index
}

fn signature(
    graph: &VariationGraph,
    strategy: SignatureStrategy,
    index: FrequencyIndex,
    reference: NodeId,
    variant: NodeId,
) -> VariantWindow {
    let config = FinderConfig::new(K, 31)
        .expect("valid k")
        .with_signature_strategy(strategy);
    let mut finder = KmerFinder::new(graph, config);
    finder.set_frequency_index(index);
    finder
        .find_variant_signatures(reference, variant)
        .expect("signature search succeeds")
        .expect("both alleles have windows")
}

fn decoded(graph: &VariationGraph, window: &VariantWindow) -> (Vec<String>, Vec<String>) {
    window.decode(graph.alphabet(), K).expect("k fits")
}

#[test_case(SignatureStrategy::Unaligned ; "unaligned")]
#[test_case(SignatureStrategy::Aligned ; "aligned")]
fn single_base_bubble_picks_rarest_windows(strategy: SignatureStrategy) {
    let graph = branching_graph();
    let index = index_with(&graph, 1, 2, &[("TGGAT", 2), ("TGTAT", 3)]);
    let window = signature(&graph, strategy, index, 1, 2);

    let (reference, variant) = decoded(&graph, &window);
    assert_eq!(reference, ["TGGAT"]);
    assert_eq!(variant, ["TGTAT"]);
    assert_eq!(window.max_frequency(), 5);
}

#[test_case(SignatureStrategy::Unaligned ; "unaligned")]
#[test_case(SignatureStrategy::Aligned ; "aligned")]
fn windows_spanning_the_upstream_bubble(strategy: SignatureStrategy) {
    let graph = branching_graph();
    let index = index_with(
        &graph,
        4,
        5,
        &[("GGATA", 2), ("GTATA", 4), ("GGATC", 2), ("GTATC", 3)],
    );
    let window = signature(&graph, strategy, index, 4, 5);

    let (reference, variant) = decoded(&graph, &window);
    assert_eq!(reference, ["GGATA", "GTATA"]);
    assert_eq!(variant, ["GGATC", "GTATC"]);
    assert_eq!(window.max_frequency(), 7);
}

#[test_case(SignatureStrategy::Unaligned ; "unaligned")]
#[test_case(SignatureStrategy::Aligned ; "aligned")]
fn earlier_window_wins_frequency_ties(strategy: SignatureStrategy) {
    let graph = branching_graph();
    let index = index_with(
        &graph,
        4,
        5,
        &[
            ("GGATA", 2),
            ("GTATA", 5),
            ("GGATC", 2),
            ("GTATC", 3),
            ("ACTCT", 4),
            ("CTACT", 3),
        ],
    );
    let window = signature(&graph, strategy, index, 4, 5);

    let (reference, variant) = decoded(&graph, &window);
    assert_eq!(reference, ["ACTCT"]);
    assert_eq!(variant, ["CTACT"]);
    assert_eq!(window.max_frequency(), 7);
}

#[test]
fn aligned_pairs_share_an_anchor() {
    let graph = branching_graph();
    let mut finder = KmerFinder::with_k(&graph, K, 31).expect("valid k");
    finder.find().expect("enumeration succeeds");
    let pairs = finder
        .find_windows_for_variant(1, 2)
        .expect("window search succeeds");

    // both alleles are one base long, so each slot pairs with its twin
    assert_eq!(pairs.len(), 5);
    for pair in &pairs {
        assert_eq!(pair.reference_kmers().len(), pair.variant_kmers().len());
    }
    let (reference, variant) = decoded(&graph, &pairs[0]);
    assert_eq!(reference, ["GATAC", "GATCT"]);
    assert_eq!(variant, ["TATAC", "TATCT"]);
}

#[test]
fn missing_frequency_index_is_built_from_results() {
    let graph = branching_graph();
    let mut finder = KmerFinder::with_k(&graph, K, 31).expect("valid k");
    finder.find().expect("enumeration succeeds");
    assert!(finder.frequency_index().is_empty());

    let window = finder
        .find_variant_signatures(1, 2)
        .expect("signature search succeeds")
        .expect("both alleles have windows");
    assert!(!finder.frequency_index().is_empty());
    assert_eq!(
        finder.frequency_index().get(kmer(&graph, "ACTGG")),
        finder.found_kmers().count(kmer(&graph, "ACTGG")) as u32
    );
    assert!(window.max_frequency() >= 2);
}

#[test]
fn batch_search_matches_single_calls() {
    let graph = branching_graph();
    let mut finder = KmerFinder::with_k(&graph, K, 31).expect("valid k");
    finder.find().expect("enumeration succeeds");
    let index = finder.build_frequency_index();
    finder.set_frequency_index(index);

    let loci = [(1, 2), (4, 5)];
    let batch = finder
        .find_signatures_for_variants(&loci)
        .expect("batch search succeeds");
    assert_eq!(batch.len(), 2);
    for (&(reference, variant), signature) in loci.iter().zip(&batch) {
        let single = finder
            .find_variant_signatures(reference, variant)
            .expect("signature search succeeds");
        assert_eq!(signature, &single);
    }
}

#[test]
fn minimizing_overlap_keeps_disjoint_alleles() {
    let graph = branching_graph();
    let index = index_with(&graph, 1, 2, &[("TGGAT", 2), ("TGTAT", 3)]);
    let config = FinderConfig::new(K, 31)
        .expect("valid k")
        .with_minimize_overlap(true);
    let mut finder = KmerFinder::new(&graph, config);
    finder.set_frequency_index(index);
    let window = finder
        .find_variant_signatures(1, 2)
        .expect("signature search succeeds")
        .expect("both alleles have windows");

    assert!(window
        .reference_kmers()
        .iter()
        .all(|value| !window.variant_kmers().contains(value)));
    assert_eq!(window.max_frequency(), 5);
}

#[test]
fn missing_windows_yield_none() {
    let graph = branching_graph();
    let mut finder = KmerFinder::with_k(&graph, K, 0).expect("valid k");
    finder.set_frequency_index([(0, 1)].into_iter().collect());
    // the variant node is out of budget, so it has no windows
    let result = finder
        .find_variant_signatures(1, 2)
        .expect("signature search succeeds");
    assert!(result.is_none());
}

#[test]
fn reversed_signature_reads_backwards() {
    let graph = branching_graph();
    let index = index_with(&graph, 1, 2, &[("TGGAT", 2), ("TGTAT", 3)]);
    let window = signature(&graph, SignatureStrategy::Unaligned, index, 1, 2);
    let (reference, variant) = decoded(&graph, &window.reversed(K));
    assert_eq!(reference, ["TAGGT"]);
    assert_eq!(variant, ["TATGT"]);
    assert_eq!(window.reversed(K).reversed(K), window);
}
