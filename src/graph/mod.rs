//! Genome variation graph.
//!
//! Nodes carry 2-bit packed sequences and are addressed by dense `u32`
//! indices. Edges are stored twice: as an ordered out-list on the source and
//! an ordered in-list on the target. Reference nodes form a simple path that
//! enumeration and signature search rely on.

mod compress;
mod io;

pub use compress::CompressionOutcome;
pub use io::{FORMAT_MAGIC, FORMAT_VERSION};

use bitvec::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::alphabet::{Alphabet, AlphabetError, PackedSequence};

/// Dense node index.
pub type NodeId = u32;

/// Per-node cap on edge list length (the persisted count is a single byte).
pub const MAX_DEGREE: usize = u8::MAX as usize;

/// Errors raised by graph construction, compression and persistence.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id is out of range.
    #[error("node {node} does not exist")]
    NodeNotFound {
        /// Offending id.
        node: NodeId,
    },
    /// Adding an edge would exceed [`MAX_DEGREE`].
    #[error("node {node} already has 255 edges in one direction")]
    DegreeOverflow {
        /// Node whose edge list is full.
        node: NodeId,
    },
    /// Every node has an incoming edge.
    #[error("graph has no root node")]
    NoRootNode,
    /// Every node has an outgoing edge.
    #[error("graph has no terminal node")]
    NoTerminalNode,
    /// The reference nodes do not form a single path.
    #[error("{operation}: reference path broken at node {node}")]
    ReferencePathBroken {
        /// Operation that needed the path.
        operation: &'static str,
        /// Node where the walk failed.
        node: NodeId,
    },
    /// A chain member has an incoming edge that does not come from the chain.
    #[error("compress: node {node} follows {predecessor} but its incoming edges disagree")]
    InconsistentChain {
        /// Chain member with unexpected incoming edges.
        node: NodeId,
        /// Chain member that points at it.
        predecessor: NodeId,
    },
    /// Malformed persisted graph.
    #[error("invalid graph file: {0}")]
    Format(String),
    /// Alphabet or packing error.
    #[error(transparent)]
    Alphabet(#[from] AlphabetError),
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A graph node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    sequence: PackedSequence,
    edges_out: Vec<NodeId>,
    edges_in: Vec<NodeId>,
    reference: bool,
    reference_index: u32,
}

impl Node {
    fn with_sequence(sequence: PackedSequence) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }

    /// Packed bases.
    pub fn sequence(&self) -> &PackedSequence {
        &self.sequence
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` for deletion placeholders.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Successors in insertion order.
    pub fn edges_out(&self) -> &[NodeId] {
        &self.edges_out
    }

    /// Predecessors in insertion order.
    pub fn edges_in(&self) -> &[NodeId] {
        &self.edges_in
    }

    /// Whether the node lies on the reference path.
    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Position along the reference path; meaningful only for reference nodes.
    pub fn reference_index(&self) -> u32 {
        self.reference_index
    }
}

/// Node array plus the alphabet its sequences were packed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationGraph {
    alphabet: Alphabet,
    nodes: Vec<Node>,
}

impl VariationGraph {
    /// Empty graph over `alphabet`.
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            nodes: Vec::new(),
        }
    }

    /// Empty graph over a custom alphabet such as `b"ACGT"`.
    pub fn with_alphabet(symbols: &[u8]) -> Result<Self, GraphError> {
        Ok(Self::new(Alphabet::new(symbols)?))
    }

    /// Alphabet used to pack node sequences.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, indexed by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node `id`.
    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id as usize)
            .ok_or(GraphError::NodeNotFound { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(id as usize)
            .ok_or(GraphError::NodeNotFound { node: id })
    }

    /// Append a non-reference node holding `bases`.
    pub fn add_node(&mut self, bases: &[u8]) -> NodeId {
        let sequence = PackedSequence::encode(bases, &self.alphabet);
        self.push_node(Node::with_sequence(sequence))
    }

    /// Append a node without bases (a deletion placeholder).
    pub fn add_empty_node(&mut self) -> NodeId {
        self.push_node(Node::default())
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Add the edge `from -> to`. Duplicates are not detected.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if self.node(from)?.edges_out.len() >= MAX_DEGREE {
            return Err(GraphError::DegreeOverflow { node: from });
        }
        if self.node(to)?.edges_in.len() >= MAX_DEGREE {
            return Err(GraphError::DegreeOverflow { node: to });
        }
        self.nodes[from as usize].edges_out.push(to);
        self.nodes[to as usize].edges_in.push(from);
        Ok(())
    }

    /// Flag `id` as a reference node at position `index` of the path.
    pub fn set_reference(&mut self, id: NodeId, index: u32) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        node.reference = true;
        node.reference_index = index;
        Ok(())
    }

    /// Recompute every in-list from the out-lists.
    pub fn rebuild_incoming_edges(&mut self) {
        for node in &mut self.nodes {
            node.edges_in.clear();
        }
        for from in 0..self.nodes.len() {
            for idx in 0..self.nodes[from].edges_out.len() {
                let to = self.nodes[from].edges_out[idx] as usize;
                self.nodes[to].edges_in.push(from as NodeId);
            }
        }
    }

    /// First node without incoming edges.
    pub fn root_node(&self) -> Result<NodeId, GraphError> {
        self.nodes
            .iter()
            .position(|node| node.edges_in.is_empty())
            .map(|id| id as NodeId)
            .ok_or(GraphError::NoRootNode)
    }

    /// First node without outgoing edges.
    pub fn last_node(&self) -> Result<NodeId, GraphError> {
        self.nodes
            .iter()
            .position(|node| node.edges_out.is_empty())
            .map(|id| id as NodeId)
            .ok_or(GraphError::NoTerminalNode)
    }

    /// Reference node that no other reference node points at.
    pub fn first_reference_node(&self) -> Option<NodeId> {
        first_reference(&self.nodes)
    }

    /// Reference successor of `id` whose index is one past `id`'s.
    pub fn next_reference_node(&self, id: NodeId) -> Result<Option<NodeId>, GraphError> {
        let node = self.node(id)?;
        Ok(node.edges_out.iter().copied().find(|&next| {
            let next = &self.nodes[next as usize];
            next.reference && next.reference_index == node.reference_index + 1
        }))
    }

    /// Reassign reference indices `0, 1, 2, ...` along the reference path.
    ///
    /// Returns the number of reference nodes.
    pub fn renumber_reference_path(&mut self) -> Result<usize, GraphError> {
        renumber_reference_path(&mut self.nodes)
    }

    /// Insert an empty node on every reference edge that skips exactly one
    /// reference position, so that deletions get a node of their own.
    ///
    /// Reference indices must be set. Returns the number of inserted nodes.
    pub fn add_empty_nodes(&mut self) -> Result<usize, GraphError> {
        let mut bypasses = Vec::new();
        for (from, node) in self.nodes.iter().enumerate() {
            if !node.reference {
                continue;
            }
            for &to in &node.edges_out {
                let target = &self.nodes[to as usize];
                if target.reference && target.reference_index == node.reference_index + 2 {
                    bypasses.push((from as NodeId, to));
                }
            }
        }

        for &(from, to) in &bypasses {
            let middle = self.add_empty_node();
            replace_edge(&mut self.nodes[from as usize].edges_out, to, middle);
            replace_edge(&mut self.nodes[to as usize].edges_in, from, middle);
            let node = &mut self.nodes[middle as usize];
            node.edges_in.push(from);
            node.edges_out.push(to);
        }
        debug!(inserted = bypasses.len(), "inserted empty deletion nodes");
        Ok(bypasses.len())
    }
}

fn replace_edge(edges: &mut [NodeId], old: NodeId, new: NodeId) {
    if let Some(slot) = edges.iter_mut().find(|edge| **edge == old) {
        *slot = new;
    }
}

fn reference_predecessors(nodes: &[Node], id: usize) -> impl Iterator<Item = NodeId> + '_ {
    nodes[id]
        .edges_in
        .iter()
        .copied()
        .filter(move |&pred| nodes[pred as usize].reference && pred as usize != id)
}

fn first_reference(nodes: &[Node]) -> Option<NodeId> {
    nodes
        .iter()
        .enumerate()
        .find(|(id, node)| node.reference && reference_predecessors(nodes, *id).next().is_none())
        .map(|(id, _)| id as NodeId)
}

/// Walk the reference path in topological order, numbering nodes as they are
/// reached. A successor is taken only once all of its reference predecessors
/// are numbered, which keeps deletion bypass edges from skipping a node.
pub(crate) fn renumber_reference_path(nodes: &mut [Node]) -> Result<usize, GraphError> {
    const OPERATION: &str = "renumber reference path";

    let total = nodes.iter().filter(|node| node.reference).count();
    if total == 0 {
        return Ok(0);
    }
    let mut current = first_reference(nodes).ok_or_else(|| GraphError::ReferencePathBroken {
        operation: OPERATION,
        node: nodes.iter().position(|node| node.reference).unwrap_or(0) as NodeId,
    })?;

    let view: &[Node] = nodes;
    let mut numbered = bitvec![0; view.len()];
    let mut order = Vec::with_capacity(total);
    loop {
        numbered.set(current as usize, true);
        order.push(current);
        if order.len() == total {
            break;
        }
        let next = view[current as usize]
            .edges_out
            .iter()
            .copied()
            .filter(|&next| {
                let idx = next as usize;
                view[idx].reference
                    && !numbered[idx]
                    && reference_predecessors(view, idx).all(|pred| numbered[pred as usize])
            })
            .min_by_key(|&next| view[next as usize].reference_index);
        current = next.ok_or(GraphError::ReferencePathBroken {
            operation: OPERATION,
            node: current,
        })?;
    }

    for (index, &id) in order.iter().enumerate() {
        nodes[id as usize].reference_index = index as u32;
    }
    Ok(total)
}
