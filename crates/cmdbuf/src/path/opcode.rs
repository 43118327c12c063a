//! Path opcodes (VLC_OP_*) and their operand counts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PathOpcode {
    End = 0x00,
    Close = 0x01,
    Move = 0x02,
    MoveRel = 0x03,
    Line = 0x04,
    LineRel = 0x05,
    Quad = 0x06,
    QuadRel = 0x07,
    Cubic = 0x08,
    CubicRel = 0x09,
    Break = 0x0A,
    Hline = 0x0B,
    HlineRel = 0x0C,
    Vline = 0x0D,
    VlineRel = 0x0E,
    Squad = 0x0F,
    SquadRel = 0x10,
    Scubic = 0x11,
    ScubicRel = 0x12,
    Sccwarc = 0x13,
    SccwarcRel = 0x14,
    Scwarc = 0x15,
    ScwarcRel = 0x16,
    Lccwarc = 0x17,
    LccwarcRel = 0x18,
    Lcwarc = 0x19,
    LcwarcRel = 0x1A,
}

/// Indexed by opcode value: (opcode, name, operand count).
static OPCODE_TABLE: [(PathOpcode, &str, usize); 27] = [
    (PathOpcode::End, "END", 0),
    (PathOpcode::Close, "CLOSE", 0),
    (PathOpcode::Move, "MOVE", 2),
    (PathOpcode::MoveRel, "MOVE_REL", 2),
    (PathOpcode::Line, "LINE", 2),
    (PathOpcode::LineRel, "LINE_REL", 2),
    (PathOpcode::Quad, "QUAD", 4),
    (PathOpcode::QuadRel, "QUAD_REL", 4),
    (PathOpcode::Cubic, "CUBIC", 6),
    (PathOpcode::CubicRel, "CUBIC_REL", 6),
    (PathOpcode::Break, "BREAK", 0),
    (PathOpcode::Hline, "HLINE", 1),
    (PathOpcode::HlineRel, "HLINE_REL", 1),
    (PathOpcode::Vline, "VLINE", 1),
    (PathOpcode::VlineRel, "VLINE_REL", 1),
    (PathOpcode::Squad, "SQUAD", 2),
    (PathOpcode::SquadRel, "SQUAD_REL", 2),
    (PathOpcode::Scubic, "SCUBIC", 4),
    (PathOpcode::ScubicRel, "SCUBIC_REL", 4),
    (PathOpcode::Sccwarc, "SCCWARC", 5),
    (PathOpcode::SccwarcRel, "SCCWARC_REL", 5),
    (PathOpcode::Scwarc, "SCWARC", 5),
    (PathOpcode::ScwarcRel, "SCWARC_REL", 5),
    (PathOpcode::Lccwarc, "LCCWARC", 5),
    (PathOpcode::LccwarcRel, "LCCWARC_REL", 5),
    (PathOpcode::Lcwarc, "LCWARC", 5),
    (PathOpcode::LcwarcRel, "LCWARC_REL", 5),
];

impl PathOpcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        OPCODE_TABLE.get(value as usize).map(|entry| entry.0)
    }

    pub fn name(&self) -> &'static str {
        OPCODE_TABLE[*self as usize].1
    }

    /// Number of coordinate fields following the opcode field.
    pub fn operand_count(&self) -> usize {
        OPCODE_TABLE[*self as usize].2
    }

    pub fn is_relative(&self) -> bool {
        self.name().ends_with("_REL")
    }

    pub fn all() -> impl Iterator<Item = PathOpcode> {
        OPCODE_TABLE.iter().map(|entry| entry.0)
    }
}
