//! Binary graph files on disk

mod common;

use std::fs;

use common::{branching_graph, deletion_graph};
use tempfile::tempdir;
use varsig::graph::{FORMAT_MAGIC, FORMAT_VERSION};
use varsig::{CompressionOutcome, GraphError, KmerFinder, VariationGraph};

#[test]
fn saved_graph_loads_back() {
    let dir = tempdir().expect("temp dir");
    for (name, graph) in [("branching.bin", branching_graph()), ("deletion.bin", deletion_graph())] {
        let path = dir.path().join(name);
        graph.save(&path).expect("save succeeds");

        let bytes = fs::read(&path).expect("file readable");
        assert_eq!(&bytes[..10], FORMAT_MAGIC);
        assert_eq!(bytes[10], FORMAT_VERSION);

        let mut loaded = VariationGraph::load(&path).expect("load succeeds");
        loaded.renumber_reference_path().expect("reference path intact");
        assert_eq!(loaded, graph, "{name}");
    }
}

#[test]
fn loaded_graph_enumerates_identically() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("graph.bin");
    let graph = branching_graph();
    graph.save(&path).expect("save succeeds");
    let loaded = VariationGraph::load(&path).expect("load succeeds");

    let mut original = KmerFinder::with_k(&graph, 6, 31).expect("valid k");
    let mut reloaded = KmerFinder::with_k(&loaded, 6, 31).expect("valid k");
    original.find().expect("enumeration succeeds");
    reloaded.find().expect("enumeration succeeds");
    assert_eq!(original.found_kmers(), reloaded.found_kmers());
}

#[test]
fn compressed_graph_stays_compressed_after_reload() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("compressed.bin");
    let mut graph = deletion_graph();
    graph.compress().expect("compression succeeds");
    graph.save(&path).expect("save succeeds");

    let mut loaded = VariationGraph::load(&path).expect("load succeeds");
    assert_eq!(
        loaded.compress().expect("compression succeeds"),
        CompressionOutcome::Unchanged
    );
}

#[test]
fn unreadable_files_are_reported() {
    let dir = tempdir().expect("temp dir");
    assert!(matches!(
        VariationGraph::load(dir.path().join("missing.bin")),
        Err(GraphError::Io(_))
    ));

    let garbage = dir.path().join("garbage.bin");
    fs::write(&garbage, b"NOTAGRAPH!\x01ACGT").expect("write garbage");
    assert!(matches!(
        VariationGraph::load(&garbage),
        Err(GraphError::Format(_))
    ));
}
