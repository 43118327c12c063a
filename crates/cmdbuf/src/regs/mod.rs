//! GPU hardware register dump analysis.
//!
//! Hang logs start with a dump of the host-side GPU registers (idle state,
//! chip identification, command queue pointers, MMU, debug arrays). This
//! module collects those values and turns them into short notes.

pub mod table;
pub mod dump;
pub mod analyze;

pub use analyze::{NoteLevel, RegisterNote};
pub use dump::{HardwareRegisters, RegisterEntry};
