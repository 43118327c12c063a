//! Corruption signatures and the patterns that detect them.

use serde::{Deserialize, Serialize};

/// One kind of log corruption caused by concurrent writers or a full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signature {
    DuplicateTimestamp,
    CorruptedTimestamp,
    LineMerged,
    TagMalformed,
    DataTagMixed,
    DataNoSeparator,
    MultipleCommands,
    DataTruncated,
}

impl Signature {
    pub fn all() -> [Signature; 8] {
        [
            Signature::DuplicateTimestamp,
            Signature::CorruptedTimestamp,
            Signature::LineMerged,
            Signature::TagMalformed,
            Signature::DataTagMixed,
            Signature::DataNoSeparator,
            Signature::MultipleCommands,
            Signature::DataTruncated,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signature::DuplicateTimestamp => "DUPLICATE_TIMESTAMP",
            Signature::CorruptedTimestamp => "CORRUPTED_TIMESTAMP",
            Signature::LineMerged => "LINE_MERGED",
            Signature::TagMalformed => "TAG_MALFORMED",
            Signature::DataTagMixed => "DATA_TAG_MIXED",
            Signature::DataNoSeparator => "DATA_NO_SEPARATOR",
            Signature::MultipleCommands => "MULTIPLE_COMMANDS",
            Signature::DataTruncated => "DATA_TRUNCATED",
        }
    }

    /// Short human label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Signature::DuplicateTimestamp => "duplicated timestamp",
            Signature::CorruptedTimestamp => "corrupted timestamp",
            Signature::LineMerged => "merged lines",
            Signature::TagMalformed => "malformed tag",
            Signature::DataTagMixed => "data mixed with tag",
            Signature::DataNoSeparator => "data without separator",
            Signature::MultipleCommands => "multiple commands per line",
            Signature::DataTruncated => "truncated data",
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patterns behind each signature.
pub struct Patterns;

impl Patterns {
    /// `[12/24 06:22:56]` style logger timestamp.
    pub const TIMESTAMP: &'static str = r"\[\d{1,2}/\d{1,2}\s+\d{2}:\d{2}:\d{2}\]";

    /// Seconds field with more than two digits, e.g. `06:22:562`.
    pub const CORRUPTED_TIMESTAMP: &'static str = r"\d{2}:\d{2}:\d{3,}";

    /// Logger tag, matched case-insensitively.
    pub const AP_TAG: &'static str = r"\[ap\]";

    /// Tag glued to a preceding tag, e.g. `[51][ap]`.
    pub const TAG_MALFORMED: &'static str = r"\]\[ap\]";

    /// Hex word directly followed by a bracket. Matches whose bracket opens a
    /// `[0x..` register index are discarded by the scanner.
    pub const DATA_TAG_MIXED: &'static str = r"0x[0-9A-Fa-f]{8}\[";

    /// Two hex words with nothing between them.
    pub const DATA_NO_SEPARATOR: &'static str = r"0x[0-9A-Fa-f]{8}0x[0-9A-Fa-f]";

    /// One command-word pair.
    pub const WORD_PAIR: &'static str = r"0x[0-9A-Fa-f]{8}\s+0x[0-9A-Fa-f]{8}";

    /// Short numeral dangling at the end of the line.
    pub const TRAILING_NUMERAL: &'static str = r"\s+\d{1,3}$";

    /// Line ends in a hex literal.
    pub const TRAILING_HEX: &'static str = r"0x[0-9A-Fa-f]+$";

    /// Register array dump such as `0x450[3] = 0x...`.
    pub const REGISTER_INDEX: &'static str = r"\[\d+\]\s*=";
}
