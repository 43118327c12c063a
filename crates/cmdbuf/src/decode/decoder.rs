use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::image::ImageDraw;
use super::instruction::{CommandSegment, DecodedInstruction};
use super::opcode::{words_from_bytes, OpcodeClass};
use super::state::{self, DecoderState};
use crate::conf::DecoderConfig;
use crate::memory::MemoryRead;
use crate::parser::{classify, LineKind};

/// Everything one decode run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeSession {
    pub segments: Vec<CommandSegment>,
    pub image_draws: Vec<ImageDraw>,
}

impl DecodeSession {
    pub fn instructions(&self) -> impl Iterator<Item = &DecodedInstruction> {
        self.segments.iter().flat_map(|s| s.instructions.iter())
    }

    pub fn anomalous(&self) -> impl Iterator<Item = &DecodedInstruction> {
        self.instructions().filter(|i| i.is_anomalous())
    }

    pub fn class_counts(&self) -> BTreeMap<OpcodeClass, usize> {
        let mut counts = BTreeMap::new();
        for instruction in self.instructions() {
            *counts.entry(instruction.class).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append the segments of another run, keeping image-draw links valid.
    pub fn append(&mut self, other: DecodeSession) {
        let base = self.image_draws.len();
        for mut segment in other.segments {
            for instruction in &mut segment.instructions {
                if let Some(index) = instruction.image_draw.as_mut() {
                    *index += base;
                }
            }
            self.segments.push(segment);
        }
        self.image_draws.extend(other.image_draws);
    }
}

/// Command stream decoder.
///
/// Holds only configuration; every call to a `decode_*` method starts from a
/// fresh [`DecoderState`], so repeated runs over the same input agree.
#[derive(Debug, Clone, Default)]
pub struct CommandDecoder {
    config: DecoderConfig,
}

impl CommandDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a device log holding one or more dumped buffers.
    pub fn decode_log(&self, text: &str) -> DecodeSession {
        let mut state = DecoderState::new();

        for line in text.lines() {
            let kind = classify(line);
            match kind {
                LineKind::SectionStart(marker) => {
                    state::start_segment(&mut state, &self.config, marker.segment_name());
                }
                LineKind::Metadata { address, size } => state::set_metadata(&mut state, address, size),
                LineKind::Empty | LineKind::Ignored => {}
                LineKind::Words(word) => {
                    if !state::consume_payload_slot(&mut state, &self.config, Some(word)) {
                        state::decode_word(&mut state, &self.config, word, None);
                    }
                }
                LineKind::Other => {
                    state::consume_payload_slot(&mut state, &self.config, None);
                }
            }
        }

        let session = state::finish(state, &self.config);
        tracing::info!(
            segments = session.segments.len(),
            image_draws = session.image_draws.len(),
            "Decoded log"
        );
        session
    }

    /// Decode a raw buffer pulled from memory. With `memory`, `Call`
    /// targets are fetched and their uploaded paths interpreted.
    pub fn decode_buffer(&self, name: &str, bytes: &[u8], memory: Option<&dyn MemoryRead>) -> DecodeSession {
        if bytes.len() % 8 != 0 {
            tracing::debug!(name, len = bytes.len(), "Ignoring trailing partial unit");
        }

        let mut state = DecoderState::new();
        state::start_segment(&mut state, &self.config, name);

        for word in words_from_bytes(bytes) {
            if !state::consume_payload_slot(&mut state, &self.config, Some(word)) {
                state::decode_word(&mut state, &self.config, word, memory);
            }
        }

        let session = state::finish(state, &self.config);
        tracing::info!(
            name,
            instructions = session.instructions().count(),
            image_draws = session.image_draws.len(),
            "Decoded buffer"
        );
        session
    }
}
