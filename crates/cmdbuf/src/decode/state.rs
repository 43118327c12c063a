//! Decoder state machine.
//!
//! All mutable decoding state lives in [`DecoderState`]; the free functions
//! below are its only transitions, so each can be driven directly in tests.

use super::anomaly;
use super::call::{validate_upload_frame, FrameError};
use super::context::RegisterContext;
use super::decoder::DecodeSession;
use super::image::ImageDraw;
use super::instruction::{CommandSegment, DecodedInstruction, DecodedPath};
use super::opcode::{CommandWord, OpcodeClass};
use super::register as reg;
use crate::conf::DecoderConfig;
use crate::memory::MemoryRead;
use crate::parser::IMPLICIT_SEGMENT;
use crate::path::decode_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Path data following `Data(n)` with n > 1.
    Path,
    /// Rectangle following the `Data(1)` blit marker.
    Rectangle,
}

/// Units announced by the last `Data` command that have not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayload {
    pub kind: PayloadKind,
    pub announced: u32,
    pub remaining: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DecoderState {
    pub segments: Vec<CommandSegment>,
    pub current: Option<CommandSegment>,
    /// Offset of the next unit in the current segment.
    pub offset: u32,
    pub context: RegisterContext,
    pub pending: Option<PendingPayload>,
    pub image_draws: Vec<ImageDraw>,
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_units(&self) -> u32 {
        self.pending.as_ref().map(|p| p.remaining).unwrap_or(0)
    }

    fn segment_name(&self) -> &str {
        self.current.as_ref().map(|s| s.name.as_str()).unwrap_or(IMPLICIT_SEGMENT)
    }
}

fn close_segment(state: &mut DecoderState) {
    if let Some(segment) = state.current.take() {
        // Markers with nothing after them do not produce a segment.
        if !segment.instructions.is_empty() {
            state.segments.push(segment);
        }
    }
}

/// Begin a new named segment: pending payload is flushed into the previous
/// one, then the offset and register context start over.
pub fn start_segment(state: &mut DecoderState, config: &DecoderConfig, name: &str) {
    flush_payload(state, config);
    close_segment(state);
    tracing::debug!(segment = name, "Starting command segment");
    state.current = Some(CommandSegment::new(name));
    state.offset = 0;
    state.context.reset();
}

/// Record declared address/size for the current segment.
pub fn set_metadata(state: &mut DecoderState, address: Option<u32>, size: Option<u32>) {
    if let Some(segment) = state.current.as_mut() {
        if address.is_some() {
            segment.address = address;
        }
        if size.is_some() {
            segment.size = size;
        }
    }
}

/// Feed one data-bearing unit to a pending payload. `word` is `None` for a
/// corrupted line, which still takes its slot and offset.
///
/// Returns `false` when no payload is pending.
pub fn consume_payload_slot(state: &mut DecoderState, config: &DecoderConfig, word: Option<CommandWord>) -> bool {
    let Some(pending) = state.pending.as_mut() else {
        return false;
    };

    if let Some(word) = word {
        pending.bytes.extend_from_slice(&word.to_le_bytes());
    }
    pending.remaining = pending.remaining.saturating_sub(1);
    state.offset += 8;

    if pending.remaining == 0 {
        flush_payload(state, config);
    }
    true
}

/// Attach the accumulated payload to the instruction that announced it.
/// Paths are interpreted with the path format active now.
pub fn flush_payload(state: &mut DecoderState, config: &DecoderConfig) {
    let Some(pending) = state.pending.take() else {
        return;
    };
    let Some(instruction) = state.current.as_mut().and_then(|s| s.instructions.last_mut()) else {
        return;
    };

    if pending.remaining > 0 {
        instruction.details.push(format!(
            "payload truncated: {} of {} units present",
            pending.announced - pending.remaining,
            pending.announced
        ));
    }
    if pending.bytes.is_empty() {
        return;
    }

    if pending.kind == PayloadKind::Path && config.parse_path {
        let context = state.context.path.clone();
        let segments = decode_path(&pending.bytes, context.format);
        instruction.path = Some(DecodedPath { segments, context });
    }
    instruction.payload = Some(pending.bytes);
}

/// Decode one word pair that is not payload.
pub fn decode_word(
    state: &mut DecoderState,
    config: &DecoderConfig,
    word: CommandWord,
    memory: Option<&dyn MemoryRead>,
) {
    if state.current.is_none() {
        state.current = Some(CommandSegment::new(IMPLICIT_SEGMENT));
    }

    let mut instruction = DecodedInstruction::new(state.offset, word);
    instruction.anomalies = anomaly::classify(word, &config.limits);
    let mut arm: Option<(PayloadKind, u32)> = None;

    match instruction.class {
        OpcodeClass::StateWrite => {
            let address = word.register();
            instruction.description = format!("write {}", reg::display_name(address));
            instruction.details = state.context.apply_write(address, word.data, config.parse_image);
        }
        OpcodeClass::StateBurst => {
            instruction.description = format!(
                "burst write {} registers from {}",
                word.state_count(),
                reg::display_name(word.register())
            );
        }
        OpcodeClass::End => {
            instruction.description = "end".to_string();
            if word.interrupt() != 0 {
                instruction.details.push(format!("interrupt: {}", word.interrupt()));
            }
        }
        OpcodeClass::Semaphore => {
            instruction.description = format!("semaphore id={}", word.count());
        }
        OpcodeClass::Stall => {
            instruction.description = format!("stall id={}", word.count());
            if word.count() == 7 {
                instruction.details.push("wait all paths".to_string());
            }
        }
        OpcodeClass::Data => {
            let count = word.count();
            if count == 1 {
                instruction.description = "rectangle blit data".to_string();
                if config.parse_image && state.context.image.src_address != 0 {
                    instruction.image_draw = Some(finalize_image_draw(state, instruction.offset));
                }
            } else {
                instruction.description = format!("path data ({} bytes, {} units)", u64::from(count) * 8, count);
            }

            if count > config.limits.max_payload_units {
                tracing::warn!(
                    offset = instruction.offset,
                    count,
                    "Data count above payload ceiling, not consuming following units"
                );
                instruction.details.push(format!(
                    "payload not consumed: {} units exceeds ceiling {}",
                    count, config.limits.max_payload_units
                ));
            } else if count == 1 {
                arm = Some((PayloadKind::Rectangle, 1));
            } else if count > 1 {
                arm = Some((PayloadKind::Path, count));
            }
        }
        OpcodeClass::Call => {
            let units = word.count();
            instruction.description = "call uploaded path".to_string();
            instruction.details.push(format!("address: 0x{:08X}", word.data));
            instruction.details.push(format!("length: {} bytes ({} units)", u64::from(units) * 8, units));
            if let Some(memory) = memory {
                resolve_call(state, config, &mut instruction, memory);
            }
        }
        OpcodeClass::Return => instruction.description = "return".to_string(),
        OpcodeClass::Nop => instruction.description = "nop".to_string(),
        OpcodeClass::Unknown => {
            instruction.description = format!("unknown command (opcode 0x{:08X})", word.opcode_bits());
        }
    }

    if let Some(segment) = state.current.as_mut() {
        segment.instructions.push(instruction);
    }
    state.offset += 8;

    if let Some((kind, units)) = arm {
        state.pending = Some(PendingPayload {
            kind,
            announced: units,
            remaining: units,
            bytes: Vec::with_capacity(units as usize * 8),
        });
    }
}

fn finalize_image_draw(state: &mut DecoderState, offset: u32) -> usize {
    let draw = ImageDraw::snapshot(
        &state.context.image,
        &state.context.image_matrix,
        &state.context.blend,
        offset,
        state.segment_name(),
    );
    state.image_draws.push(draw);
    // The target usually stays the same across consecutive draws.
    state.context.image.src_address = 0;
    state.image_draws.len() - 1
}

/// Fetch and interpret the uploaded path named by a `Call`.
fn resolve_call(
    state: &DecoderState,
    config: &DecoderConfig,
    instruction: &mut DecodedInstruction,
    memory: &dyn MemoryRead,
) {
    let address = instruction.word.data;
    let len = instruction.word.count() as usize * 8;
    if address == 0 || len == 0 {
        return;
    }

    let frame = memory
        .read(u64::from(address), len)
        .ok_or(FrameError::Unreadable { address, len })
        .and_then(validate_upload_frame);

    let frame = match frame {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(offset = instruction.offset, "Uploaded path rejected: {}", e);
            instruction.details.push(format!("[{}]", e));
            return;
        }
    };

    let context = state.context.path.clone();
    instruction.details.push(format!(
        "[uploaded path: format={}, header DATA({}), trailer RETURN]",
        context.format, frame.declared_units
    ));
    instruction.payload = Some(frame.body.to_vec());

    if config.parse_path {
        let segments = decode_path(frame.body, context.format);
        if !segments.is_empty() {
            instruction.details.push(format!("[{} path segments]", segments.len()));
        }
        instruction.path = Some(DecodedPath { segments, context });
    }
}

/// Flush what is left and hand the segments over.
pub fn finish(mut state: DecoderState, config: &DecoderConfig) -> DecodeSession {
    flush_payload(&mut state, config);
    close_segment(&mut state);
    DecodeSession {
        segments: state.segments,
        image_draws: state.image_draws,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FlatImage;
    use crate::path::{encode_path, PathFormat, PathOpcode, PathSegment};
    use bytes::Bytes;

    fn cfg() -> DecoderConfig {
        DecoderConfig::default()
    }

    fn w(cmd: u32, data: u32) -> CommandWord {
        CommandWord::new(cmd, data)
    }

    fn last(state: &DecoderState) -> &DecodedInstruction {
        state.current.as_ref().unwrap().instructions.last().unwrap()
    }

    #[test]
    fn test_implicit_segment_and_offsets() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x3001_0A00, 0x100), None);
        decode_word(&mut state, &cfg(), w(0x8000_0000, 0), None);
        let seg = state.current.as_ref().unwrap();
        assert_eq!(seg.name, IMPLICIT_SEGMENT);
        assert_eq!(seg.instructions[0].offset, 0);
        assert_eq!(seg.instructions[1].offset, 8);
        assert_eq!(state.offset, 16);
    }

    #[test]
    fn test_segment_start_resets_context_and_offset() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x3001_0A34, 0x0000_0000), None);
        assert_eq!(state.context.path.format, PathFormat::S8);

        start_segment(&mut state, &cfg(), "next");
        assert_eq!(state.offset, 0);
        assert_eq!(state.context.path.format, PathFormat::Fp32);
        assert_eq!(state.segments.len(), 1);
        assert_eq!(state.current.as_ref().unwrap().name, "next");
    }

    #[test]
    fn test_empty_segments_dropped() {
        let mut state = DecoderState::new();
        start_segment(&mut state, &cfg(), "empty");
        start_segment(&mut state, &cfg(), "full");
        decode_word(&mut state, &cfg(), w(0x8000_0000, 0), None);
        let session = finish(state, &cfg());
        assert_eq!(session.segments.len(), 1);
        assert_eq!(session.segments[0].name, "full");
    }

    #[test]
    fn test_metadata_without_segment_is_ignored() {
        let mut state = DecoderState::new();
        set_metadata(&mut state, Some(0x1000), Some(0x20));
        assert!(state.current.is_none());

        start_segment(&mut state, &cfg(), "s");
        set_metadata(&mut state, Some(0x1000), None);
        set_metadata(&mut state, None, Some(0x20));
        let seg = state.current.as_ref().unwrap();
        assert_eq!((seg.address, seg.size), (Some(0x1000), Some(0x20)));
    }

    #[test]
    fn test_data_payload_decoded_with_format_at_flush() {
        let path = vec![
            PathSegment::new(PathOpcode::Move, vec![1.0, 2.0]),
            PathSegment::new(PathOpcode::Line, vec![3.0, 4.0]),
            PathSegment::new(PathOpcode::End, vec![]),
        ];
        let mut bytes = encode_path(&path, PathFormat::S16);
        bytes.resize(16, 0);

        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x4000_0002, 0), None);
        assert_eq!(state.pending_units(), 2);

        // Format switch before the payload arrives: the latest value wins.
        state.context.path.format = PathFormat::S16;
        let first = CommandWord::from_le_slice(&bytes[0..8]).unwrap();
        let second = CommandWord::from_le_slice(&bytes[8..16]).unwrap();
        assert!(consume_payload_slot(&mut state, &cfg(), Some(first)));
        assert!(consume_payload_slot(&mut state, &cfg(), Some(second)));
        assert!(state.pending.is_none());
        assert_eq!(state.offset, 24);

        let data = last(&state);
        assert_eq!(data.payload.as_deref(), Some(&bytes[..]));
        let decoded = data.path.as_ref().unwrap();
        assert_eq!(decoded.context.format, PathFormat::S16);
        assert_eq!(decoded.segments[0], path[0]);
        assert_eq!(decoded.segments[1], path[1]);
    }

    #[test]
    fn test_corrupted_slot_consumes_offset_only() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x4000_0002, 0), None);
        consume_payload_slot(&mut state, &cfg(), None);
        consume_payload_slot(&mut state, &cfg(), Some(w(0x0000_0002, 0)));
        assert_eq!(state.offset, 24);
        assert_eq!(last(&state).payload.as_ref().map(Vec::len), Some(8));
    }

    #[test]
    fn test_no_pending_slot() {
        let mut state = DecoderState::new();
        assert!(!consume_payload_slot(&mut state, &cfg(), Some(w(0, 0))));
        assert_eq!(state.offset, 0);
    }

    #[test]
    fn test_parse_path_disabled_keeps_raw_bytes() {
        let config = DecoderConfig {
            parse_path: false,
            ..Default::default()
        };
        let mut state = DecoderState::new();
        decode_word(&mut state, &config, w(0x4000_0002, 0), None);
        consume_payload_slot(&mut state, &config, Some(w(0x0000_0002, 0)));
        consume_payload_slot(&mut state, &config, Some(w(0, 0)));
        assert!(last(&state).payload.is_some());
        assert!(last(&state).path.is_none());
    }

    #[test]
    fn test_oversized_data_does_not_arm() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x4000_1001, 0), None);
        assert!(state.pending.is_none());
        assert!(last(&state).details[0].contains("not consumed"));
    }

    #[test]
    fn test_partial_payload_flushed_at_finish() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x4000_0004, 0), None);
        consume_payload_slot(&mut state, &cfg(), Some(w(0x0000_0002, 0)));
        let session = finish(state, &cfg());
        let data = &session.segments[0].instructions[0];
        assert_eq!(data.payload.as_ref().map(Vec::len), Some(8));
        assert!(data.details.iter().any(|d| d == "payload truncated: 1 of 4 units present"));
    }

    #[test]
    fn test_blit_marker_finalizes_image_and_takes_rectangle() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x3001_0A01, 0x3000_0000), None);
        decode_word(&mut state, &cfg(), w(0x3001_0A29, 0x2000_0000), None);
        decode_word(&mut state, &cfg(), w(0x4000_0001, 0), None);

        assert_eq!(state.image_draws.len(), 1);
        assert_eq!(state.image_draws[0].src_address, 0x2000_0000);
        assert_eq!(state.image_draws[0].offset, 16);
        assert_eq!(state.context.image.src_address, 0);
        assert_eq!(state.context.image.dst_address, 0x3000_0000);
        assert_eq!(last(&state).image_draw, Some(0));

        // The rectangle unit is payload, not a command.
        assert_eq!(state.pending_units(), 1);
        consume_payload_slot(&mut state, &cfg(), Some(w(0x0010_0010, 0x0020_0020)));
        assert!(last(&state).path.is_none());
        assert_eq!(last(&state).payload.as_ref().map(Vec::len), Some(8));
    }

    #[test]
    fn test_blit_marker_without_source_records_nothing() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x4000_0001, 0), None);
        assert!(state.image_draws.is_empty());
        assert_eq!(last(&state).image_draw, None);
    }

    fn upload(body: &[u8], trailer: u32) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&w(0x4000_0000 | (body.len() as u32 / 8), 0).to_le_bytes());
        frame.extend_from_slice(body);
        frame.extend_from_slice(&w(trailer, 0).to_le_bytes());
        frame
    }

    #[test]
    fn test_call_resolves_uploaded_path() {
        let path = vec![
            PathSegment::new(PathOpcode::Move, vec![0.0, 0.0]),
            PathSegment::new(PathOpcode::End, vec![]),
        ];
        let mut body = encode_path(&path, PathFormat::Fp32);
        body.resize(16, 0);
        let mut blob = vec![0u8; 0x100];
        let frame = upload(&body, 0x7000_0000);
        blob.extend_from_slice(&frame);
        let memory = FlatImage::new(Bytes::from(blob));

        let mut state = DecoderState::new();
        let units = frame.len() as u32 / 8;
        decode_word(&mut state, &cfg(), w(0x6000_0000 | units, 0x100), Some(&memory));

        let call = last(&state);
        assert_eq!(call.path_segments()[0], path[0]);
        assert!(call.details.iter().any(|d| d.contains("uploaded path: format=FP32")));
        assert_eq!(call.payload.as_ref().map(Vec::len), Some(16));
    }

    #[test]
    fn test_call_frame_failure_attaches_note() {
        let mut blob = vec![0u8; 0x100];
        let frame = upload(&[0u8; 8], 0x8000_0000);
        blob.extend_from_slice(&frame);
        let memory = FlatImage::new(Bytes::from(blob));

        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x6000_0003, 0x100), Some(&memory));
        let call = last(&state);
        assert!(call.path.is_none());
        assert!(call.details.iter().any(|d| d.contains("trailer check failed")));

        decode_word(&mut state, &cfg(), w(0x6000_0003, 0x1_0000), Some(&memory));
        assert!(last(&state).details.iter().any(|d| d.contains("cannot read")));
    }

    #[test]
    fn test_descriptions() {
        let mut state = DecoderState::new();
        decode_word(&mut state, &cfg(), w(0x2000_0007, 0), None);
        assert_eq!(last(&state).description, "stall id=7");
        assert_eq!(last(&state).details, vec!["wait all paths"]);

        decode_word(&mut state, &cfg(), w(0x0000_0005, 0), None);
        assert_eq!(last(&state).details, vec!["interrupt: 5"]);

        decode_word(&mut state, &cfg(), w(0x3004_0A40, 0), None);
        assert_eq!(last(&state).description, "burst write 4 registers from VgPathMatrix0");

        decode_word(&mut state, &cfg(), w(0xB000_0000, 0), None);
        assert_eq!(last(&state).description, "unknown command (opcode 0xB0000000)");
        assert!(last(&state).is_anomalous());
    }
}
