//! Anomaly classification of single command words.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::opcode::{CommandWord, OpcodeClass};
use super::register as reg;
use crate::conf::Limits;

/// Why an instruction looks wrong. An instruction with at least one anomaly
/// is flagged in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    UnknownOpcode { opcode: u32 },
    UnknownRegister { address: u16 },
    /// Address register holding a null pointer or a debug fill pattern.
    SuspiciousAddress { register: u16, value: u32 },
    AddressOutOfRange { register: u16, value: u32 },
    BurstTooLarge { count: u32 },
    SemaphoreOutOfRange { id: u32 },
    StallOutOfRange { id: u32 },
    OversizedData { count: u32 },
    SuspiciousCallTarget { address: u32 },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownOpcode { opcode } => write!(f, "unknown opcode: 0x{:08X}", opcode),
            Anomaly::UnknownRegister { address } => write!(f, "unknown register address: 0x{:04X}", address),
            Anomaly::SuspiciousAddress { value, .. } => {
                write!(f, "suspicious address value: 0x{:08X} (possible null pointer)", value)
            }
            Anomaly::AddressOutOfRange { value, .. } => {
                write!(f, "address value may be out of range: 0x{:08X}", value)
            }
            Anomaly::BurstTooLarge { count } => write!(f, "burst write count too large: {}", count),
            Anomaly::SemaphoreOutOfRange { id } => write!(f, "semaphore id out of range: {}", id),
            Anomaly::StallOutOfRange { id } => write!(f, "stall id out of range: {}", id),
            Anomaly::OversizedData { count } => {
                write!(f, "data size implausibly large: {} bytes", u64::from(*count) * 8)
            }
            Anomaly::SuspiciousCallTarget { address } => write!(f, "suspicious call address: 0x{:08X}", address),
        }
    }
}

/// Apply every rule that concerns `word` alone.
pub fn classify(word: CommandWord, limits: &Limits) -> Vec<Anomaly> {
    let mut found = Vec::new();

    match word.class() {
        OpcodeClass::Unknown => found.push(Anomaly::UnknownOpcode {
            opcode: word.opcode_bits(),
        }),
        OpcodeClass::StateWrite => {
            let address = word.register();
            if !reg::is_known_register(address) && !reg::in_valid_range(address) {
                found.push(Anomaly::UnknownRegister { address });
            }
            if reg::is_address_register(address) {
                let value = word.data;
                if reg::is_suspicious_value(value) {
                    found.push(Anomaly::SuspiciousAddress { register: address, value });
                }
                if value != 0 && !limits.in_address_window(value) {
                    found.push(Anomaly::AddressOutOfRange { register: address, value });
                }
            }
        }
        OpcodeClass::StateBurst => {
            let count = word.state_count();
            if count > limits.max_burst_count {
                found.push(Anomaly::BurstTooLarge { count });
            }
        }
        OpcodeClass::Semaphore => {
            let id = word.count();
            if id > limits.max_sync_id {
                found.push(Anomaly::SemaphoreOutOfRange { id });
            }
        }
        OpcodeClass::Stall => {
            let id = word.count();
            if id > limits.max_sync_id {
                found.push(Anomaly::StallOutOfRange { id });
            }
        }
        OpcodeClass::Data => {
            let count = word.count();
            if count > limits.anomalous_payload_units {
                found.push(Anomaly::OversizedData { count });
            }
        }
        OpcodeClass::Call => {
            if reg::is_suspicious_value(word.data) {
                found.push(Anomaly::SuspiciousCallTarget { address: word.data });
            }
        }
        OpcodeClass::End | OpcodeClass::Return | OpcodeClass::Nop => {}
    }

    found
}
