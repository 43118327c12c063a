/// Log normalization module
///
/// Turns raw device-log lines into something the command decoder can use:
/// colors, logger prefixes, timestamps and tags are removed, and each line is
/// classified as a section marker, buffer metadata, a command-word pair, or
/// noise.
///
/// # Architecture
///
/// - `ansi.rs`: SGR color stripping and log timestamp removal
/// - `normalize.rs`: `clean_line`, word-pair extraction, line classification
///
/// Nothing here fails: lines that cannot be understood classify as
/// `LineKind::Other` and the caller decides what to do with them.

pub mod ansi;
pub mod normalize;

pub use ansi::strip_ansi_codes;
pub use normalize::{classify, clean_line, find_word_pair, LineKind, SectionMarker, IMPLICIT_SEGMENT};
