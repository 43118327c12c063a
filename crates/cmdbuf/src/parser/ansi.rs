/// ANSI color stripping and log-timestamp handling
///
/// Device consoles colorize their output, and captured logs frequently carry
/// the escape sequences either as the real ESC byte or as the printable
/// artifacts `^[` / `\033` left behind by terminal loggers. All three forms
/// are removed before a line is matched for command words.

use std::borrow::Cow;

/// Introducers recognized in front of `[<params>m`.
const SGR_INTRODUCERS: [&[u8]; 3] = [b"\x1b", b"^[", b"\\033"];

/// Strip SGR color sequences (`<intro>[0;32m`).
///
/// Only sequences made of digits and `;` and terminated by `m` are removed;
/// anything else is left untouched.
///
/// Returns Cow::Borrowed if nothing was stripped.
pub fn strip_ansi_codes(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    if !bytes.contains(&0x1b) && !input.contains("^[") && !input.contains("\\033") {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(len) = sgr_len(&bytes[i..]) {
            output.push_str(&input[copied..i]);
            i += len;
            copied = i;
            continue;
        }
        i += 1;
    }

    if copied == 0 {
        return Cow::Borrowed(input);
    }
    output.push_str(&input[copied..]);
    Cow::Owned(output)
}

/// Length of an SGR sequence starting at `bytes[0]`, if there is one.
fn sgr_len(bytes: &[u8]) -> Option<usize> {
    let intro = SGR_INTRODUCERS
        .iter()
        .find(|intro| bytes.starts_with(intro))?;
    let rest = &bytes[intro.len()..];
    if rest.first() != Some(&b'[') {
        return None;
    }
    let params = rest[1..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b';')
        .count();
    if rest.get(1 + params) == Some(&b'm') {
        Some(intro.len() + 1 + params + 1)
    } else {
        None
    }
}

/// Strip a leading `YYYY-MM-DD HH:MM:SS[.fff]` timestamp and the whitespace
/// after it.
pub fn strip_log_timestamp(input: &str) -> &str {
    let b = input.as_bytes();
    // Minimum length: YYYY-MM-DD + one space + HH:MM:SS
    if b.len() < 19 {
        return input;
    }

    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    if !digits(0..4) || b[4] != b'-' || !digits(5..7) || b[7] != b'-' || !digits(8..10) {
        return input;
    }

    let mut i = 10;
    let gap = b[i..].iter().take_while(|c| is_space(**c)).count();
    if gap == 0 {
        return input;
    }
    i += gap;

    if b.len() < i + 8 {
        return input;
    }
    if !digits(i..i + 2) || b[i + 2] != b':' || !digits(i + 3..i + 5) || b[i + 5] != b':' || !digits(i + 6..i + 8) {
        return input;
    }
    i += 8;

    // Fractional seconds: any run of digits and dots
    i += b[i..].iter().take_while(|c| c.is_ascii_digit() || **c == b'.').count();
    i += b[i..].iter().take_while(|c| is_space(**c)).count();

    &input[i..]
}

/// ASCII whitespace as understood by log tooling (includes vertical tab).
pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
