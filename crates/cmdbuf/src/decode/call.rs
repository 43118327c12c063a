//! Framing of uploaded paths referenced by `Call` commands.
//!
//! An uploaded path is a small command buffer of its own: a `Data` header
//! whose count covers the path bytes, the raw path, then a `Return` unit.

use thiserror::Error;

use super::opcode::{NIBBLE_DATA, RETURN_WORD};

/// Header unit plus trailer unit.
pub const MIN_FRAME_LEN: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("cannot read 0x{address:08X} ({len} bytes)")]
    Unreadable { address: u32, len: usize },

    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("header check failed: expected DATA (0x4xxxxxxx), got 0x{0:08X}")]
    BadHeader(u32),

    #[error("trailer check failed: expected RETURN (0x70000000), got 0x{0:08X}")]
    BadTrailer(u32),
}

/// A validated upload frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadFrame<'a> {
    /// Unit count announced by the header.
    pub declared_units: u32,
    /// Bytes between header and trailer.
    pub body: &'a [u8],
}

fn word_at(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub fn validate_upload_frame(bytes: &[u8]) -> Result<UploadFrame<'_>, FrameError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }

    let header = word_at(bytes, 0);
    if (header >> 28) as u8 != NIBBLE_DATA {
        return Err(FrameError::BadHeader(header));
    }

    let trailer = word_at(bytes, bytes.len() - 8);
    if trailer != RETURN_WORD {
        return Err(FrameError::BadTrailer(trailer));
    }

    Ok(UploadFrame {
        declared_units: header & 0x0FFF_FFFF,
        body: &bytes[8..bytes.len() - 8],
    })
}
