//! Path numeric format: how wide each opcode and coordinate field is.
//!
//! The format is never encoded in the payload itself. It comes from the
//! `VgPathControl` register (bits 20..22) active when the payload is decoded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PathFormat {
    /// Signed 8-bit fields
    S8,
    /// Signed 16-bit fields
    S16,
    /// Signed 32-bit fields
    S32,
    /// IEEE-754 single precision fields (4-byte opcode fields)
    #[default]
    Fp32,
}

impl PathFormat {
    /// Decode the two format bits of `VgPathControl` (already shifted down).
    pub fn from_control_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => PathFormat::S8,
            1 => PathFormat::S16,
            2 => PathFormat::S32,
            _ => PathFormat::Fp32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PathFormat::S8 => "S8",
            PathFormat::S16 => "S16",
            PathFormat::S32 => "S32",
            PathFormat::Fp32 => "FP32",
        }
    }

    /// Bytes per field. Opcodes and coordinates share the same width.
    pub fn field_size(&self) -> usize {
        match self {
            PathFormat::S8 => 1,
            PathFormat::S16 => 2,
            PathFormat::S32 | PathFormat::Fp32 => 4,
        }
    }

    /// Read an opcode field as an unsigned value.
    pub fn read_field(&self, bytes: &[u8]) -> Option<u32> {
        match self {
            PathFormat::S8 => bytes.first().map(|&b| b as u32),
            PathFormat::S16 => {
                let raw: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
                Some(u16::from_le_bytes(raw) as u32)
            }
            PathFormat::S32 | PathFormat::Fp32 => {
                let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                Some(u32::from_le_bytes(raw))
            }
        }
    }

    /// Read a coordinate field. Integer widths are sign-extended.
    pub fn read_coord(&self, bytes: &[u8]) -> Option<f64> {
        match self {
            PathFormat::S8 => bytes.first().map(|&b| b as i8 as f64),
            PathFormat::S16 => {
                let raw: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
                Some(i16::from_le_bytes(raw) as f64)
            }
            PathFormat::S32 => {
                let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                Some(i32::from_le_bytes(raw) as f64)
            }
            PathFormat::Fp32 => {
                let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                Some(f32::from_le_bytes(raw) as f64)
            }
        }
    }

    pub fn write_field(&self, value: u32, out: &mut Vec<u8>) {
        match self {
            PathFormat::S8 => out.push(value as u8),
            PathFormat::S16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            PathFormat::S32 | PathFormat::Fp32 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Write a coordinate. Integer widths saturate at the field bounds.
    pub fn write_coord(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            PathFormat::S8 => out.push((value.round() as i8) as u8),
            PathFormat::S16 => out.extend_from_slice(&(value.round() as i16).to_le_bytes()),
            PathFormat::S32 => out.extend_from_slice(&(value.round() as i32).to_le_bytes()),
            PathFormat::Fp32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

impl std::fmt::Display for PathFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
