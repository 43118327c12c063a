use serde::{Deserialize, Serialize};

use super::anomaly::Anomaly;
use super::context::PathContext;
use super::opcode::{CommandWord, OpcodeClass};
use crate::path::PathSegment;

/// Path interpreted from a payload, with the state that governed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPath {
    pub segments: Vec<PathSegment>,
    pub context: PathContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedInstruction {
    /// Byte offset inside the segment.
    pub offset: u32,
    pub word: CommandWord,
    pub class: OpcodeClass,
    pub description: String,
    pub details: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    /// Raw payload bytes that followed a `Data` announcement, or the body of
    /// an uploaded path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<DecodedPath>,
    /// Index into the session's image draws.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_draw: Option<usize>,
}

impl DecodedInstruction {
    pub fn new(offset: u32, word: CommandWord) -> Self {
        Self {
            offset,
            word,
            class: word.class(),
            description: String::new(),
            details: Vec::new(),
            anomalies: Vec::new(),
            payload: None,
            path: None,
            image_draw: None,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        !self.anomalies.is_empty()
    }

    pub fn path_segments(&self) -> &[PathSegment] {
        self.path.as_ref().map(|p| p.segments.as_slice()).unwrap_or(&[])
    }
}

/// One dumped buffer: a named run of instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSegment {
    pub name: String,
    /// Declared GPU address of the buffer, if the log printed one.
    pub address: Option<u32>,
    pub size: Option<u32>,
    pub instructions: Vec<DecodedInstruction>,
}

impl CommandSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            size: None,
            instructions: Vec::new(),
        }
    }

    pub fn anomalous(&self) -> impl Iterator<Item = &DecodedInstruction> {
        self.instructions.iter().filter(|i| i.is_anomalous())
    }
}
