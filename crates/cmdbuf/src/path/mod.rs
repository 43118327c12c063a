//! Vector path payloads: the nested binary format carried by `Data` and
//! `Call` instructions.
//!
//! # Architecture
//!
//! - `format.rs`: numeric field widths (S8 / S16 / S32 / FP32)
//! - `opcode.rs`: the fixed 27-entry path opcode table
//! - `interpreter.rs`: byte run -> path segments, and the inverse encoder

pub mod format;
pub mod opcode;
pub mod interpreter;

pub use format::PathFormat;
pub use opcode::PathOpcode;
pub use interpreter::{decode_path, encode_path, PathSegment};
