//! Report assembly and rendering.
//!
//! A [`Report`] bundles a decode session with the optional side results
//! (integrity findings, register notes, coredump metadata). It serializes to
//! JSON as is, or renders to plain text through [`render_text`].

pub mod model;
pub mod text;

pub use model::{ImageStats, IntegrityReport, Report, SegmentStats};
pub use text::{render_text, TextOptions};
