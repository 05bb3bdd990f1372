//! Graph fixtures shared by the integration tests.
#![allow(dead_code)]

use varsig::{NodeId, VariationGraph};

/// `ACTGACTGACTG -> {G | T} -> AT -> {ACT | CTA} -> CTGCTTTTTTTT`, first
/// allele of each bubble on the reference.
///
/// Node ids: 0 head, 1 `G` (ref), 2 `T`, 3 `AT`, 4 `ACT` (ref), 5 `CTA`,
/// 6 tail.
pub fn branching_graph() -> VariationGraph {
    build(
        &[
            ("ACTGACTGACTG", true),
            ("G", true),
            ("T", false),
            ("AT", true),
            ("ACT", true),
            ("CTA", false),
            ("CTGCTTTTTTTT", true),
        ],
        &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (3, 5), (4, 6), (5, 6)],
    )
}

/// `ACGTTGCA -> {G | deletion} -> CCAT -> {T | A} -> GGTAC`.
///
/// Node ids: 0 head, 1 `G` (ref), 2 empty, 3 `CCAT`, 4 `T` (ref), 5 `A`,
/// 6 tail.
pub fn deletion_graph() -> VariationGraph {
    build(
        &[
            ("ACGTTGCA", true),
            ("G", true),
            ("", false),
            ("CCAT", true),
            ("T", true),
            ("A", false),
            ("GGTAC", true),
        ],
        &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (3, 5), (4, 6), (5, 6)],
    )
}

/// Nodes in order; reference nodes are numbered as they appear.
pub fn build(nodes: &[(&str, bool)], edges: &[(NodeId, NodeId)]) -> VariationGraph {
    let mut graph = VariationGraph::default();
    let mut index = 0;
    for &(bases, reference) in nodes {
        let id = if bases.is_empty() {
            graph.add_empty_node()
        } else {
            graph.add_node(bases.as_bytes())
        };
        if reference {
            graph.set_reference(id, index).expect("node exists");
            index += 1;
        }
    }
    for &(from, to) in edges {
        graph.add_edge(from, to).expect("edge fits");
    }
    graph
}

/// Right-justified value of a literal k-mer.
pub fn kmer(graph: &VariationGraph, bases: &str) -> u64 {
    graph
        .alphabet()
        .hash_min(bases.as_bytes())
        .expect("k-mer fits in a word")
}
