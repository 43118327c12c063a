//! Integrity: detection of log lines damaged by interleaved writers.
//!
//! The scanner works on raw, unnormalized lines and is purely diagnostic:
//! its findings tell an operator which decoded results may rest on corrupted
//! input, but the decoder never consults them.

pub mod signature;
pub mod scanner;

pub use scanner::{IntegrityFinding, IntegrityScanner, IntegritySummary, ScanError};
pub use signature::Signature;
