//! Command words and their opcode classes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse command category, selected by the top nibble of the command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpcodeClass {
    End,
    Semaphore,
    Stall,
    /// Single register write.
    StateWrite,
    /// Multi-register write; count is anything but 1.
    StateBurst,
    Data,
    Call,
    Return,
    Nop,
    Unknown,
}

impl OpcodeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpcodeClass::End => "END",
            OpcodeClass::Semaphore => "SEMAPHORE",
            OpcodeClass::Stall => "STALL",
            OpcodeClass::StateWrite => "STATE",
            OpcodeClass::StateBurst => "STATES",
            OpcodeClass::Data => "DATA",
            OpcodeClass::Call => "CALL",
            OpcodeClass::Return => "RETURN",
            OpcodeClass::Nop => "NOP",
            OpcodeClass::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OpcodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub const NIBBLE_END: u8 = 0x0;
pub const NIBBLE_SEMAPHORE: u8 = 0x1;
pub const NIBBLE_STALL: u8 = 0x2;
pub const NIBBLE_STATE: u8 = 0x3;
pub const NIBBLE_DATA: u8 = 0x4;
pub const NIBBLE_CALL: u8 = 0x6;
pub const NIBBLE_RETURN: u8 = 0x7;
pub const NIBBLE_NOP: u8 = 0x8;

/// Complete `Return` command word.
pub const RETURN_WORD: u32 = 0x7000_0000;

/// One 8-byte command unit: the command word followed by its data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandWord {
    pub cmd: u32,
    pub data: u32,
}

impl CommandWord {
    pub const fn new(cmd: u32, data: u32) -> Self {
        Self { cmd, data }
    }

    /// Build from 8 little-endian bytes, `None` if fewer are given.
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let cmd: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
        let data: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
        Some(Self::new(u32::from_le_bytes(cmd), u32::from_le_bytes(data)))
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.cmd.to_le_bytes());
        out[4..].copy_from_slice(&self.data.to_le_bytes());
        out
    }

    pub fn nibble(&self) -> u8 {
        (self.cmd >> 28) as u8
    }

    /// `cmd & 0xF0000000`
    pub fn opcode_bits(&self) -> u32 {
        self.cmd & 0xF000_0000
    }

    pub fn class(&self) -> OpcodeClass {
        match self.nibble() {
            NIBBLE_END => OpcodeClass::End,
            NIBBLE_SEMAPHORE => OpcodeClass::Semaphore,
            NIBBLE_STALL => OpcodeClass::Stall,
            NIBBLE_STATE if self.state_count() == 1 => OpcodeClass::StateWrite,
            NIBBLE_STATE => OpcodeClass::StateBurst,
            NIBBLE_DATA => OpcodeClass::Data,
            NIBBLE_CALL => OpcodeClass::Call,
            NIBBLE_RETURN => OpcodeClass::Return,
            NIBBLE_NOP => OpcodeClass::Nop,
            _ => OpcodeClass::Unknown,
        }
    }

    /// Register count of a state command (bits 16..24).
    pub fn state_count(&self) -> u32 {
        (self.cmd >> 16) & 0xFF
    }

    /// Register address of a state command (low 16 bits).
    pub fn register(&self) -> u16 {
        (self.cmd & 0xFFFF) as u16
    }

    /// Low 28 bits: unit count for `Data`/`Call`, id for `Semaphore`/`Stall`.
    pub fn count(&self) -> u32 {
        self.cmd & 0x0FFF_FFFF
    }

    /// Interrupt number carried by `End`.
    pub fn interrupt(&self) -> u32 {
        self.cmd & 0x00FF_FFFF
    }
}

impl fmt::Display for CommandWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} {:08X}", self.cmd, self.data)
    }
}

/// Reshape a raw buffer into little-endian word pairs. A trailing partial
/// unit is ignored.
pub fn words_from_bytes(bytes: &[u8]) -> impl Iterator<Item = CommandWord> + '_ {
    bytes.chunks_exact(8).filter_map(CommandWord::from_le_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_by_nibble() {
        let cases = [
            (0x0000_0000, OpcodeClass::End),
            (0x1000_0001, OpcodeClass::Semaphore),
            (0x2000_0007, OpcodeClass::Stall),
            (0x3001_0A00, OpcodeClass::StateWrite),
            (0x3004_0A40, OpcodeClass::StateBurst),
            (0x3000_0A40, OpcodeClass::StateBurst),
            (0x4000_0003, OpcodeClass::Data),
            (0x6000_0010, OpcodeClass::Call),
            (0x7000_0000, OpcodeClass::Return),
            (0x8000_0000, OpcodeClass::Nop),
            (0x5000_0000, OpcodeClass::Unknown),
            (0xF123_4567, OpcodeClass::Unknown),
        ];
        for (cmd, class) in cases {
            assert_eq!(CommandWord::new(cmd, 0).class(), class, "cmd 0x{:08X}", cmd);
        }
    }

    #[test]
    fn test_field_extraction() {
        let word = CommandWord::new(0x3004_0A40, 0);
        assert_eq!(word.state_count(), 4);
        assert_eq!(word.register(), 0x0A40);

        let end = CommandWord::new(0x0012_3456, 0);
        assert_eq!(end.interrupt(), 0x12_3456);
        assert_eq!(CommandWord::new(0x4000_0100, 0).count(), 0x100);
    }

    #[test]
    fn test_le_bytes() {
        let word = CommandWord::new(0x4000_0002, 0xDEAD_BEEF);
        let bytes = word.to_le_bytes();
        assert_eq!(bytes, [0x02, 0x00, 0x00, 0x40, 0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(CommandWord::from_le_slice(&bytes), Some(word));
        assert_eq!(CommandWord::from_le_slice(&bytes[..7]), None);
    }

    #[test]
    fn test_words_from_bytes_drops_partial_tail() {
        let mut raw = CommandWord::new(0x3001_0A00, 0x100).to_le_bytes().to_vec();
        raw.extend_from_slice(&[1, 2, 3]);
        let words: Vec<_> = words_from_bytes(&raw).collect();
        assert_eq!(words, vec![CommandWord::new(0x3001_0A00, 0x100)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(CommandWord::new(0x3001_0A00, 0x100).to_string(), "30010A00 00000100");
        assert_eq!(OpcodeClass::StateBurst.to_string(), "STATES");
    }
}
