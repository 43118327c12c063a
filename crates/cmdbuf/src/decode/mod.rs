//! Command decoder: turns word pairs into annotated instructions.
//!
//! # Architecture
//!
//! - `opcode.rs`: command word layout and opcode classes
//! - `register.rs`: static register name, blend mode and image format tables
//! - `context.rs`: register context carried across writes within a segment
//! - `anomaly.rs`: per-word anomaly rules
//! - `image.rs`: finalized image blits
//! - `call.rs`: uploaded path frame validation for `Call`
//! - `instruction.rs`: decoded instruction and segment types
//! - `state.rs`: explicit decoder state and its transitions
//! - `decoder.rs`: log and buffer entry points

pub mod opcode;
pub mod register;
pub mod context;
pub mod anomaly;
pub mod image;
pub mod call;
pub mod instruction;
pub mod state;
pub mod decoder;

pub use anomaly::Anomaly;
pub use call::{validate_upload_frame, FrameError, UploadFrame};
pub use context::{FillRule, PathContext, RegisterContext, TessWindow};
pub use decoder::{CommandDecoder, DecodeSession};
pub use image::ImageDraw;
pub use instruction::{CommandSegment, DecodedInstruction, DecodedPath};
pub use opcode::{words_from_bytes, CommandWord, OpcodeClass};
pub use state::DecoderState;
