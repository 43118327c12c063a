use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::table::{host_register, named_register};
use crate::parser::clean_line;

/// Register values printed by the driver before the command buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareRegisters {
    /// `name = 0x..` lines, e.g. `idle`.
    pub named: BTreeMap<String, u32>,
    /// `0xADDR = 0x..` lines.
    pub by_address: BTreeMap<u32, u32>,
    /// `0xADDR[i] = 0x..` lines.
    pub arrays: BTreeMap<u32, BTreeMap<u32, u32>>,
}

/// One labelled register value, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterEntry {
    pub key: String,
    pub name: &'static str,
    pub value: u32,
    pub description: &'static str,
}

fn parse_hex(text: &str) -> Option<u32> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    let end = digits.bytes().take_while(u8::is_ascii_hexdigit).count();
    if end == 0 || end > 8 {
        return None;
    }
    u32::from_str_radix(&digits[..end], 16).ok()
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

enum Assignment<'a> {
    Named(&'a str, u32),
    Address(u32, u32),
    Element(u32, u32, u32),
}

fn parse_assignment(line: &str) -> Option<Assignment<'_>> {
    let (left, right) = line.split_once('=')?;
    let left = left.trim();
    let value = parse_hex(right.trim())?;

    if let Some((base, rest)) = left.split_once('[') {
        let index = rest.strip_suffix(']')?.trim().parse().ok()?;
        return Some(Assignment::Element(parse_hex(base.trim())?, index, value));
    }
    if left.starts_with("0x") || left.starts_with("0X") {
        return Some(Assignment::Address(parse_hex(left)?, value));
    }
    // Only the last word: `reg idle = 0x..` still names `idle`.
    let name = left.rsplit(char::is_whitespace).next()?;
    is_identifier(name).then_some(Assignment::Named(name, value))
}

impl HardwareRegisters {
    /// Collect register lines up to the first command buffer marker.
    pub fn parse(text: &str) -> Self {
        let mut regs = Self::default();

        for raw in text.lines() {
            let lower = raw.to_ascii_lowercase();
            if lower.contains("init command buffer") || lower.contains("last submit command") {
                break;
            }

            match parse_assignment(&clean_line(raw)) {
                Some(Assignment::Named(name, value)) => {
                    regs.named.insert(name.to_string(), value);
                }
                Some(Assignment::Address(address, value)) => {
                    regs.by_address.insert(address, value);
                }
                Some(Assignment::Element(address, index, value)) => {
                    regs.arrays.entry(address).or_default().insert(index, value);
                }
                None => {}
            }
        }

        tracing::debug!(
            named = regs.named.len(),
            registers = regs.by_address.len(),
            arrays = regs.arrays.len(),
            "Parsed GPU register dump"
        );
        regs
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.by_address.is_empty() && self.arrays.is_empty()
    }

    pub fn get(&self, address: u32) -> Option<u32> {
        self.by_address.get(&address).copied()
    }

    pub fn named(&self, name: &str) -> Option<u32> {
        self.named.get(name).copied()
    }

    /// Known registers with their labels; unknown ones are skipped.
    pub fn entries(&self) -> Vec<RegisterEntry> {
        let named = self.named.iter().filter_map(|(key, value)| {
            named_register(key).map(|description| RegisterEntry {
                key: key.clone(),
                name: "",
                value: *value,
                description,
            })
        });
        let addressed = self.by_address.iter().filter_map(|(address, value)| {
            host_register(*address).map(|(name, description)| RegisterEntry {
                key: format!("0x{:x}", address),
                name,
                value: *value,
                description,
            })
        });
        named.chain(addressed).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
[12/24 06:22:56] [51] [ap] idle = 0x7fffffff
[12/24 06:22:56] [51] [ap] AQHiClockControl = 0x00000100
[12/24 06:22:56] [51] [ap] 0x1c = 0x00000355
[12/24 06:22:56] [51] [ap] 0x448[0] = 0xbabef00d
[12/24 06:22:56] [51] [ap] 0x448[1] = 0x00000000
[12/24 06:22:56] [51] [ap] init command buffer:
[12/24 06:22:56] [51] [ap] 0x504 = 0x00000001
";

    #[test]
    fn test_parse_dump() {
        let regs = HardwareRegisters::parse(DUMP);
        assert_eq!(regs.named("idle"), Some(0x7FFF_FFFF));
        assert_eq!(regs.named("AQHiClockControl"), Some(0x100));
        assert_eq!(regs.get(0x1C), Some(0x355));
        assert_eq!(regs.arrays[&0x448][&0], 0xBABE_F00D);
        assert_eq!(regs.arrays[&0x448].len(), 2);
    }

    #[test]
    fn test_stops_at_command_buffer() {
        let regs = HardwareRegisters::parse(DUMP);
        assert_eq!(regs.get(0x504), None);
    }

    #[test]
    fn test_entries_labelled() {
        let regs = HardwareRegisters::parse(DUMP);
        let entries = regs.entries();
        assert!(entries.iter().any(|e| e.key == "0x1c" && e.name == "AQChipId"));
        assert!(entries.iter().any(|e| e.key == "idle"));
    }

    #[test]
    fn test_ignores_command_words() {
        let regs = HardwareRegisters::parse("0x30010A00 0x00000100\nnothing to see\n");
        assert!(regs.is_empty());
    }
}
