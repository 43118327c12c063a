//! Path interpreter: turns a raw payload into ordered path segments.
//!
//! Decoding is best-effort: payloads come from logs and coredumps that may be
//! truncated or partially overwritten, so nothing here returns an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::PathFormat;
use super::opcode::PathOpcode;

/// One vector path operation with its coordinate operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub opcode: PathOpcode,
    pub coords: Vec<f64>,
}

impl PathSegment {
    pub fn new(opcode: PathOpcode, coords: Vec<f64>) -> Self {
        Self { opcode, coords }
    }

    /// True when the payload ended before all operands were read.
    pub fn is_truncated(&self) -> bool {
        self.coords.len() < self.opcode.operand_count()
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.opcode.name())?;
        for c in &self.coords {
            write!(f, "{:.2},", c)?;
        }
        Ok(())
    }
}

/// Decode `bytes` as a sequence of path segments in `format`.
///
/// - Opcodes are looked up by the low byte of the opcode field.
/// - Unknown opcodes are skipped one field at a time to resynchronize.
/// - Decoding stops at `END` or when the bytes run out; a final segment whose
///   operands were cut short keeps the operands that could be read.
pub fn decode_path(bytes: &[u8], format: PathFormat) -> Vec<PathSegment> {
    let width = format.field_size();
    let mut segments = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let field = match format.read_field(&bytes[offset..]) {
            Some(field) => field,
            None => break,
        };
        offset += width;

        let opcode = match PathOpcode::from_u8((field & 0xFF) as u8) {
            Some(opcode) => opcode,
            None => continue,
        };

        let mut coords = Vec::with_capacity(opcode.operand_count());
        for _ in 0..opcode.operand_count() {
            if offset >= bytes.len() {
                break;
            }
            if let Some(coord) = format.read_coord(&bytes[offset..]) {
                coords.push(coord);
            }
            offset += width;
        }

        segments.push(PathSegment { opcode, coords });

        if opcode == PathOpcode::End {
            break;
        }
    }

    segments
}

/// Inverse of [`decode_path`]: encode segments back into a payload.
///
/// Missing operands of a truncated segment are not padded.
pub fn encode_path(segments: &[PathSegment], format: PathFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(segments.len() * format.field_size() * 3);
    for segment in segments {
        format.write_field(segment.opcode as u32, &mut out);
        for &coord in segment.coords.iter().take(segment.opcode.operand_count()) {
            format.write_coord(coord, &mut out);
        }
    }
    out
}
