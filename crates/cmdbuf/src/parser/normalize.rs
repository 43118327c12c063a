//! Line normalization and classification for dumped command-buffer logs.

use serde::{Deserialize, Serialize};

use super::ansi::{is_space, strip_ansi_codes, strip_log_timestamp};
use crate::decode::CommandWord;

/// Section markers printed by the driver in front of each dumped buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionMarker {
    /// `init command buffer`
    Init,
    /// `last submit command`
    LastSubmit,
    /// `last submit command ... before hang`
    LastSubmitBeforeHang,
}

impl SectionMarker {
    pub fn segment_name(&self) -> &'static str {
        match self {
            SectionMarker::Init => "init command buffer",
            SectionMarker::LastSubmit => "last submitted commands",
            SectionMarker::LastSubmitBeforeHang => "last submitted commands before hang",
        }
    }
}

/// What a single log line means to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Empty,
    SectionStart(SectionMarker),
    /// `addr 0x... size 0x...` describing the current section.
    Metadata { address: Option<u32>, size: Option<u32> },
    /// Idle register dumps interleaved with the buffer.
    Ignored,
    Words(CommandWord),
    Other,
}

impl LineKind {
    /// Lines that occupy a command-word slot (possibly corrupted).
    pub fn is_data_bearing(&self) -> bool {
        matches!(self, LineKind::Words(_) | LineKind::Other)
    }
}

/// Name of the segment used when the log carries no section markers.
pub const IMPLICIT_SEGMENT: &str = "command buffer";

/// Remove colors, the logger prefix up to `[ap]`, a leading timestamp, and
/// bracketed tags. Tags are kept when the line already starts with `0x`.
pub fn clean_line(line: &str) -> String {
    let line = strip_ansi_codes(line);
    let line = strip_ap_prefix(&line);
    let line = strip_log_timestamp(line);

    if line.trim_start().starts_with("0x") {
        line.trim().to_string()
    } else {
        strip_bracket_tags(line).trim().to_string()
    }
}

/// Drop everything up to and including the first `[ap]` tag.
fn strip_ap_prefix(line: &str) -> &str {
    let lower = line.to_ascii_lowercase();
    match lower.find("[ap]") {
        Some(pos) => {
            let rest = &line[pos + 4..];
            let gap = rest.bytes().take_while(|b| is_space(*b)).count();
            &rest[gap..]
        }
        None => line,
    }
}

fn strip_bracket_tags(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close) = bytes[i + 1..].iter().position(|b| *b == b']') {
                out.push_str(&line[copied..i]);
                i += close + 2;
                i += bytes[i..].iter().take_while(|b| is_space(**b)).count();
                copied = i;
                continue;
            }
            break;
        }
        i += 1;
    }
    out.push_str(&line[copied..]);
    out
}

fn is_hex_word(bytes: &[u8]) -> bool {
    bytes.len() >= 10 && bytes[0] == b'0' && bytes[1] == b'x' && bytes[2..10].iter().all(u8::is_ascii_hexdigit)
}

fn parse_hex_word(bytes: &[u8]) -> Option<u32> {
    let digits = std::str::from_utf8(&bytes[2..10]).ok()?;
    u32::from_str_radix(digits, 16).ok()
}

/// First `0xXXXXXXXX <whitespace> 0xXXXXXXXX` pair on the line.
pub fn find_word_pair(line: &str) -> Option<CommandWord> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i + 10 <= bytes.len() {
        if is_hex_word(&bytes[i..]) {
            let gap = bytes[i + 10..].iter().take_while(|b| is_space(**b)).count();
            let second = i + 10 + gap;
            if gap > 0 && is_hex_word(&bytes[second..]) {
                let cmd = parse_hex_word(&bytes[i..])?;
                let data = parse_hex_word(&bytes[second..])?;
                return Some(CommandWord::new(cmd, data));
            }
        }
        i += 1;
    }
    None
}

/// Value of the `0x..` literal following `key` and at least one space.
fn hex_after_key(line: &str, lower: &str, key: &str) -> Option<u32> {
    let mut search = 0;
    while let Some(found) = lower[search..].find(key) {
        let start = search + found + key.len();
        let rest = &line.as_bytes()[start..];
        let gap = rest.iter().take_while(|b| is_space(**b)).count();
        let value = &rest[gap..];
        if gap > 0 && value.len() > 2 && (value.starts_with(b"0x") || value.starts_with(b"0X")) {
            let digits = value[2..].iter().take_while(|b| b.is_ascii_hexdigit()).count();
            if digits > 0 {
                let text = std::str::from_utf8(&value[2..2 + digits]).ok()?;
                return u32::from_str_radix(text, 16).ok();
            }
        }
        search = start;
    }
    None
}

/// Clean `raw` and decide what it contributes to decoding.
pub fn classify(raw: &str) -> LineKind {
    let line = clean_line(raw);
    if line.is_empty() {
        return LineKind::Empty;
    }

    let lower = line.to_ascii_lowercase();
    if lower.contains("init command buffer") {
        return LineKind::SectionStart(SectionMarker::Init);
    }
    if lower.contains("last submit command") {
        let marker = if lower.contains("before hang") {
            SectionMarker::LastSubmitBeforeHang
        } else {
            SectionMarker::LastSubmit
        };
        return LineKind::SectionStart(marker);
    }
    if lower.contains("addr 0x") && lower.contains("size 0x") {
        return LineKind::Metadata {
            address: hex_after_key(&line, &lower, "addr"),
            size: hex_after_key(&line, &lower, "size"),
        };
    }
    if lower.contains("idle reg") {
        return LineKind::Ignored;
    }

    match find_word_pair(&line) {
        Some(word) => LineKind::Words(word),
        None => LineKind::Other,
    }
}
