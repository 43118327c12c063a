use std::fmt;

use serde::{Deserialize, Serialize};

use super::dump::HardwareRegisters;
use super::table::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    Info,
    Warning,
}

/// One conclusion drawn from the register dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNote {
    pub level: NoteLevel,
    pub topic: String,
    pub detail: String,
}

impl RegisterNote {
    fn info(topic: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Info,
            topic: topic.into(),
            detail: detail.into(),
        }
    }

    fn warning(topic: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Warning,
            topic: topic.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RegisterNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.level {
            NoteLevel::Info => " ",
            NoteLevel::Warning => "!",
        };
        write!(f, "{} {}: {}", mark, self.topic, self.detail)
    }
}

/// The chip time register holds the date as BCD, `0x20230415`.
fn bcd_date(value: u32) -> Option<String> {
    let digits = format!("{:08X}", value);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (year, month, day) = (&digits[0..4], &digits[4..6], &digits[6..8]);
    let month_ok = matches!(month.parse::<u8>(), Ok(1..=12));
    let day_ok = matches!(day.parse::<u8>(), Ok(1..=31));
    (month_ok && day_ok).then(|| format!("{}-{}-{}", year, month, day))
}

fn array_name(address: u32) -> String {
    match host_register(address) {
        Some((name, _)) => name.to_string(),
        None => format!("0x{:x}", address),
    }
}

impl HardwareRegisters {
    pub fn analyze(&self) -> Vec<RegisterNote> {
        let mut notes = Vec::new();

        if let Some(idle) = self.named("idle") {
            if idle == ALL_IDLE {
                notes.push(RegisterNote::info("GPU state", "idle (all modules idle)"));
            } else {
                let busy = (ALL_IDLE & !idle).count_ones();
                notes.push(RegisterNote::warning(
                    "GPU state",
                    format!("busy (idle=0x{:08X}, {} modules not idle)", idle, busy),
                ));
            }
        }

        if let Some(id) = self.get(REG_CHIP_ID) {
            notes.push(RegisterNote::info("chip id", format!("0x{:08X}", id)));
        }
        if let Some(rev) = self.get(REG_CHIP_REV) {
            notes.push(RegisterNote::info("chip revision", format!("0x{:04X}", rev)));
        }
        if let Some(time) = self.get(REG_CHIP_TIME) {
            let detail = match bcd_date(time) {
                Some(date) => format!("0x{:08X} ({})", time, date),
                None => format!("0x{:08X}", time),
            };
            notes.push(RegisterNote::info("chip date", detail));
        }

        for (address, topic) in [
            (REG_CMD_BUFFER_START, "command buffer start"),
            (REG_CMD_BUFFER_ADDR, "command buffer current"),
            (REG_FETCH_ADDR, "fetch address / PC"),
        ] {
            if let Some(value) = self.get(address) {
                notes.push(RegisterNote::info(topic, format!("0x{:08X}", value)));
            }
        }

        if let Some(status) = self.get(REG_MMU_STATUS) {
            notes.push(RegisterNote::info("MMU status", format!("0x{:03X}", status)));
        }
        match self.get(REG_MMU_EXCEPTION) {
            Some(0) | None => {}
            Some(address) => notes.push(RegisterNote::warning(
                "MMU exception",
                format!("0x{:08X}, possible illegal memory access", address),
            )),
        }

        for (address, values) in &self.arrays {
            for (index, value) in values {
                if let Some(meaning) = sentinel_meaning(*value) {
                    notes.push(RegisterNote::info(
                        format!("{}[{}]", array_name(*address), index),
                        format!("0x{:08X} {}", value, meaning),
                    ));
                }
            }
        }

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs(text: &str) -> HardwareRegisters {
        HardwareRegisters::parse(text)
    }

    #[test]
    fn test_idle_and_busy() {
        let notes = regs("idle = 0x7fffffff").analyze();
        assert_eq!(notes[0], RegisterNote::info("GPU state", "idle (all modules idle)"));

        let notes = regs("idle = 0x7ffffffc").analyze();
        assert_eq!(notes[0].level, NoteLevel::Warning);
        assert!(notes[0].detail.contains("2 modules not idle"));
    }

    #[test]
    fn test_chip_info() {
        let notes = regs("0x1c = 0x00000355\n0x20 = 0x00001217\n0x28 = 0x20230415\n").analyze();
        let details: Vec<&str> = notes.iter().map(|n| n.detail.as_str()).collect();
        assert_eq!(details, vec!["0x00000355", "0x1217", "0x20230415 (2023-04-15)"]);
    }

    #[test]
    fn test_chip_date_not_bcd() {
        let notes = regs("0x28 = 0x0000ABCD").analyze();
        assert_eq!(notes[0].detail, "0x0000ABCD");
    }

    #[test]
    fn test_mmu_exception() {
        let notes = regs("0x504 = 0x1\n0x508 = 0x00000000\n").analyze();
        assert_eq!(notes.len(), 1);

        let notes = regs("0x508 = 0xdead0000").analyze();
        assert_eq!(notes[0].level, NoteLevel::Warning);
        assert_eq!(notes[0].topic, "MMU exception");
    }

    #[test]
    fn test_array_sentinels() {
        let notes = regs("0x448[0] = 0xbabef00d\n0x448[1] = 0x1\n0x999[2] = 0xaaaaaaaa\n").analyze();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].topic, "AQModuleDebug[0]");
        assert_eq!(notes[1].topic, "0x999[2]");
        assert!(notes[1].detail.ends_with("fill pattern"));
    }

    #[test]
    fn test_display() {
        let note = RegisterNote::warning("MMU exception", "0x00000010");
        assert_eq!(note.to_string(), "! MMU exception: 0x00000010");
    }
}
