use std::io::Read;
use std::path::Path;

use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use tracing::debug;

use super::IngestError;

fn is_sequence_base(base: u8) -> bool {
    matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N')
}

/// Bases of the first record whose leading id token is `name`.
fn select_record(mut reader: Box<dyn FastxReader + '_>, name: &str) -> Result<Vec<u8>, IngestError> {
    while let Some(record) = reader.next() {
        let record = record?;
        let token = record
            .id()
            .split(|byte| byte.is_ascii_whitespace())
            .next()
            .unwrap_or_default();
        if token != name.as_bytes() {
            continue;
        }
        let bases: Vec<u8> = record
            .seq()
            .iter()
            .copied()
            .filter(|&base| is_sequence_base(base))
            .collect();
        debug!(chromosome = name, bases = bases.len(), "read chromosome");
        return Ok(bases);
    }
    Err(IngestError::ChromosomeNotFound(name.to_string()))
}

/// Read the bases of the record whose first header token is `name`.
///
/// Anything other than `ACGTN` (either case) is dropped.
pub fn read_chromosome<R: Read + Send + 'static>(reader: R, name: &str) -> Result<Vec<u8>, IngestError> {
    select_record(parse_fastx_reader(reader)?, name)
}

/// [`read_chromosome`] on a file.
pub fn load_chromosome<P: AsRef<Path>>(path: P, name: &str) -> Result<Vec<u8>, IngestError> {
    select_record(parse_fastx_file(path.as_ref())?, name)
}
