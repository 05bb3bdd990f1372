use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use super::IngestError;
use crate::alphabet::Alphabet;
use crate::graph::{NodeId, VariationGraph};

struct Segment {
    id: u64,
    sequence: Vec<u8>,
}

struct Link {
    line: usize,
    from: u64,
    to: u64,
}

fn gfa_error(line: usize, message: impl Into<String>) -> IngestError {
    IngestError::Gfa {
        line,
        message: message.into(),
    }
}

fn parse_id(field: Option<&str>, line: usize, what: &str) -> Result<u64, IngestError> {
    let field = field.ok_or_else(|| gfa_error(line, format!("missing {what}")))?;
    field
        .parse()
        .map_err(|_| gfa_error(line, format!("invalid {what} {field:?}")))
}

fn forward(field: Option<&str>, line: usize) -> Result<(), IngestError> {
    match field {
        Some("+") => Ok(()),
        Some(other) => Err(gfa_error(line, format!("unsupported orientation {other:?}"))),
        None => Err(gfa_error(line, "missing orientation")),
    }
}

/// Segment id to node id. Contiguous ids are shifted to start at 0; other
/// id sets are numbered in order of appearance.
fn id_map(segments: &[Segment]) -> HashMap<u64, NodeId> {
    let (Some(min), Some(max)) = (
        segments.iter().map(|segment| segment.id).min(),
        segments.iter().map(|segment| segment.id).max(),
    ) else {
        return HashMap::new();
    };
    let contiguous = max - min + 1 == segments.len() as u64;
    if contiguous && min != 0 {
        info!(min, max, "shifting contiguous segment ids to start at 0");
    } else if !contiguous {
        info!("segment ids are not contiguous; numbering in order of appearance");
    }

    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let node = if contiguous { segment.id - min } else { idx as u64 };
            (segment.id, node as NodeId)
        })
        .collect()
}

/// Read a GFA v1 graph. `S` lines become nodes (`*` for an empty sequence),
/// `L` lines become edges (forward orientation only) and the first `P` line
/// marks the reference path.
pub fn read_gfa<R: BufRead>(reader: R, alphabet: &Alphabet) -> Result<VariationGraph, IngestError> {
    let mut segments = Vec::new();
    let mut segment_lines = HashMap::new();
    let mut links = Vec::new();
    let mut reference: Option<(usize, Vec<u64>)> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let mut fields = line.trim_end_matches('\r').split('\t');
        match fields.next() {
            Some("S") => {
                let id = parse_id(fields.next(), line_no, "segment id")?;
                let sequence = match fields.next() {
                    Some("*") => Vec::new(),
                    Some(bases) => bases.as_bytes().to_vec(),
                    None => return Err(gfa_error(line_no, "missing segment sequence")),
                };
                if let Some(first) = segment_lines.insert(id, line_no) {
                    return Err(gfa_error(
                        line_no,
                        format!("segment {id} already declared on line {first}"),
                    ));
                }
                segments.push(Segment { id, sequence });
            }
            Some("L") => {
                let from = parse_id(fields.next(), line_no, "link source")?;
                forward(fields.next(), line_no)?;
                let to = parse_id(fields.next(), line_no, "link target")?;
                forward(fields.next(), line_no)?;
                links.push(Link {
                    line: line_no,
                    from,
                    to,
                });
            }
            Some("P") => {
                if reference.is_some() {
                    warn!(line = line_no, "ignoring additional path line");
                    continue;
                }
                let _name = fields.next();
                let steps = fields
                    .next()
                    .ok_or_else(|| gfa_error(line_no, "missing path steps"))?;
                let ids = steps
                    .split(',')
                    .filter(|step| !step.is_empty())
                    .map(|step| match step.strip_suffix('+') {
                        Some(id) => parse_id(Some(id), line_no, "path step"),
                        None => Err(gfa_error(line_no, format!("unsupported path step {step:?}"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                reference = Some((line_no, ids));
            }
            _ => {}
        }
    }

    let map = id_map(&segments);
    let resolve = |id: u64, line: usize| {
        map.get(&id)
            .copied()
            .ok_or_else(|| gfa_error(line, format!("unknown segment {id}")))
    };

    let mut ordered: Vec<Option<Vec<u8>>> = vec![None; segments.len()];
    for segment in segments {
        if let Some(&node) = map.get(&segment.id) {
            ordered[node as usize] = Some(segment.sequence);
        }
    }

    let mut graph = VariationGraph::new(alphabet.clone());
    for sequence in ordered.into_iter().flatten() {
        if sequence.is_empty() {
            graph.add_empty_node();
        } else {
            graph.add_node(&sequence);
        }
    }
    if let Some((line, ids)) = reference {
        for (index, id) in ids.into_iter().enumerate() {
            graph.set_reference(resolve(id, line)?, index as u32)?;
        }
    }
    for link in &links {
        graph.add_edge(resolve(link.from, link.line)?, resolve(link.to, link.line)?)?;
    }

    info!(nodes = graph.len(), edges = links.len(), "read GFA graph");
    Ok(graph)
}

/// [`read_gfa`] on a file.
pub fn load_gfa<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> Result<VariationGraph, IngestError> {
    let file = File::open(path.as_ref())?;
    read_gfa(BufReader::new(file), alphabet)
}
