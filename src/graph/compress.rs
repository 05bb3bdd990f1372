//! Collapsing unbranched reference chains into single nodes.

use bitvec::prelude::*;
use tracing::info;

use super::{renumber_reference_path, GraphError, Node, NodeId, VariationGraph};
use crate::alphabet::PackedSequence;

/// Result of [`VariationGraph::compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// No chain could be shortened; the graph is untouched.
    Unchanged,
    /// The node array was replaced.
    Compressed {
        /// Node count before compression.
        before: usize,
        /// Node count after compression.
        after: usize,
    },
}

impl VariationGraph {
    /// Merge every maximal run of reference nodes linked by single edges
    /// (one out-edge on the source, one in-edge on the target) into one node.
    ///
    /// The merged node keeps the outgoing edges of the last member and the
    /// incoming edges of the first, remapped to the new ids. Reference
    /// indices are renumbered along the path afterwards. On error the graph
    /// is left as it was.
    pub fn compress(&mut self) -> Result<CompressionOutcome, GraphError> {
        let (runs, id_map) = self.chain_runs()?;
        let before = self.nodes.len();
        if runs.len() == before {
            info!(nodes = before, "no nodes can be compressed");
            return Ok(CompressionOutcome::Unchanged);
        }

        let remap = |edges: &[NodeId]| -> Vec<NodeId> {
            edges.iter().map(|&edge| id_map[edge as usize]).collect()
        };
        let mut compressed = Vec::with_capacity(runs.len());
        for run in &runs {
            let first = &self.nodes[run[0] as usize];
            let last = &self.nodes[run[run.len() - 1] as usize];
            let mut sequence = PackedSequence::default();
            for &member in run {
                sequence.append(&self.nodes[member as usize].sequence);
            }
            compressed.push(Node {
                sequence,
                edges_out: remap(&last.edges_out),
                edges_in: remap(&first.edges_in),
                reference: first.reference,
                reference_index: first.reference_index,
            });
        }

        renumber_reference_path(&mut compressed)?;
        self.nodes = compressed;
        let after = self.nodes.len();
        info!(before, after, "compressed graph");
        Ok(CompressionOutcome::Compressed { before, after })
    }

    /// Group node ids into runs and map every old id to its run index.
    fn chain_runs(&self) -> Result<(Vec<Vec<NodeId>>, Vec<NodeId>), GraphError> {
        let mut visited = bitvec![0; self.nodes.len()];
        let mut id_map = vec![0 as NodeId; self.nodes.len()];
        let mut runs: Vec<Vec<NodeId>> = Vec::new();

        for start in 0..self.nodes.len() {
            if visited[start] {
                continue;
            }
            let run_id = runs.len() as NodeId;
            let mut run = vec![start as NodeId];
            visited.set(start, true);
            id_map[start] = run_id;

            if self.nodes[start].reference {
                let mut current = start as NodeId;
                while let Some(next) = self.chain_successor(current, &visited)? {
                    visited.set(next as usize, true);
                    id_map[next as usize] = run_id;
                    run.push(next);
                    current = next;
                }
            }
            runs.push(run);
        }
        Ok((runs, id_map))
    }

    fn chain_successor(
        &self,
        current: NodeId,
        visited: &BitSlice,
    ) -> Result<Option<NodeId>, GraphError> {
        let &[next] = self.nodes[current as usize].edges_out.as_slice() else {
            return Ok(None);
        };
        let successor = &self.nodes[next as usize];
        if visited[next as usize] || !successor.reference || successor.edges_in.len() > 1 {
            return Ok(None);
        }
        if successor.edges_in != [current] {
            return Err(GraphError::InconsistentChain {
                node: next,
                predecessor: current,
            });
        }
        Ok(Some(next))
    }
}
