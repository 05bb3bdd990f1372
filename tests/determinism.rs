mod common;

use std::collections::HashSet;
use std::fmt::Write;

use blake3::hash;
use common::{branching_graph, deletion_graph};
use varsig::{FinderConfig, KmerFinder, SignatureStrategy};

#[test]
fn enumeration_is_deterministic() {
    let graph = deletion_graph();
    let mut fingerprints = HashSet::new();
    for _ in 0..5 {
        let config = FinderConfig::new(5, 2)
            .expect("valid k")
            .with_start_positions(true)
            .with_kmer_positions(true);
        let mut finder = KmerFinder::new(&graph, config);
        finder.find().expect("enumeration succeeds");

        let mut rendered = String::new();
        for record in finder.found_kmers().iter() {
            writeln!(
                rendered,
                "{}\t{}\t{:?}\t{:?}",
                record.kmer, record.node, record.start_position, record.kmer_position
            )
            .expect("writing to a string succeeds");
        }
        fingerprints.insert(hash(rendered.as_bytes()));
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}

#[test]
fn signature_search_is_deterministic() {
    let graph = branching_graph();
    for strategy in [SignatureStrategy::Unaligned, SignatureStrategy::Aligned] {
        let mut fingerprints = HashSet::new();
        for _ in 0..5 {
            let config = FinderConfig::new(5, 31)
                .expect("valid k")
                .with_signature_strategy(strategy);
            let mut finder = KmerFinder::new(&graph, config);
            finder.find().expect("enumeration succeeds");
            let signatures = finder
                .find_signatures_for_variants(&[(1, 2), (4, 5)])
                .expect("signature search succeeds");
            fingerprints.insert(hash(format!("{signatures:?}").as_bytes()));
        }
        assert_eq!(fingerprints.len(), 1, "{strategy:?} diverged across runs");
    }
}
