//! Binary graph persistence.
//!
//! Layout (little-endian): the magic `BIOCYGRAPH`, a version byte, the four
//! alphabet symbols, a `u32` node count, then per node a `u32` length, a
//! `u32` word count, the packed words as `u64`, a `u8` out-edge count, the
//! out-edges as `u32` and a reference flag byte. Incoming edges and
//! reference indices are not stored.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::{GraphError, Node, VariationGraph};
use crate::alphabet::{words_for_len, Alphabet, PackedSequence};

/// Leading bytes of every graph file.
pub const FORMAT_MAGIC: &[u8; 10] = b"BIOCYGRAPH";
/// The only version this crate reads and writes.
pub const FORMAT_VERSION: u8 = 1;

impl VariationGraph {
    /// Serialize the graph to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), GraphError> {
        writer.write_all(FORMAT_MAGIC)?;
        writer.write_u8(FORMAT_VERSION)?;
        writer.write_all(&self.alphabet.symbols())?;
        writer.write_u32::<LittleEndian>(to_u32(self.nodes.len(), "node count")?)?;

        for node in &self.nodes {
            let sequence = node.sequence();
            writer.write_u32::<LittleEndian>(to_u32(sequence.len(), "node length")?)?;
            writer.write_u32::<LittleEndian>(to_u32(sequence.word_count(), "word count")?)?;
            for &word in sequence.words() {
                writer.write_u64::<LittleEndian>(word)?;
            }
            let degree = u8::try_from(node.edges_out.len())
                .map_err(|_| GraphError::Format("out-degree exceeds 255".into()))?;
            writer.write_u8(degree)?;
            for &edge in &node.edges_out {
                writer.write_u32::<LittleEndian>(edge)?;
            }
            writer.write_u8(u8::from(node.reference))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Deserialize a graph from `reader`, rebuilding incoming edges.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, GraphError> {
        let mut magic = [0u8; 10];
        reader.read_exact(&mut magic)?;
        if &magic != FORMAT_MAGIC {
            return Err(GraphError::Format("bad magic".into()));
        }
        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(GraphError::Format(format!(
                "unsupported version {version}"
            )));
        }
        let mut symbols = [0u8; 4];
        reader.read_exact(&mut symbols)?;
        let alphabet = Alphabet::new(&symbols)?;

        let count = reader.read_u32::<LittleEndian>()? as usize;
        let mut nodes = Vec::with_capacity(count.min(1 << 20));
        for id in 0..count {
            let len = reader.read_u32::<LittleEndian>()? as usize;
            let word_count = reader.read_u32::<LittleEndian>()? as usize;
            if word_count != words_for_len(len) {
                return Err(GraphError::Format(format!(
                    "node {id}: {word_count} words for {len} bases"
                )));
            }
            let mut words = vec![0u64; word_count];
            reader.read_u64_into::<LittleEndian>(&mut words)?;

            let degree = reader.read_u8()? as usize;
            let mut edges_out = vec![0u32; degree];
            reader.read_u32_into::<LittleEndian>(&mut edges_out)?;
            if let Some(&edge) = edges_out.iter().find(|&&edge| edge as usize >= count) {
                return Err(GraphError::Format(format!(
                    "node {id}: edge to missing node {edge}"
                )));
            }
            let reference = reader.read_u8()? != 0;

            nodes.push(Node {
                sequence: PackedSequence::from_words(words, len)?,
                edges_out,
                edges_in: Vec::new(),
                reference,
                reference_index: 0,
            });
        }

        let mut graph = Self { alphabet, nodes };
        graph.rebuild_incoming_edges();
        Ok(graph)
    }

    /// Write the graph to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), GraphError> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))?;
        debug!(path = %path.as_ref().display(), nodes = self.len(), "saved graph");
        Ok(())
    }

    /// Read a graph from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let file = File::open(path.as_ref())?;
        let graph = Self::read_from(BufReader::new(file))?;
        debug!(path = %path.as_ref().display(), nodes = graph.len(), "loaded graph");
        Ok(graph)
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32, GraphError> {
    u32::try_from(value).map_err(|_| GraphError::Format(format!("{what} {value} exceeds u32")))
}
