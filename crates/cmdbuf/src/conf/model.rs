//! Model: DecoderConfig and related structs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Interpret `Data`/`Call` payloads as vector paths.
    pub parse_path: bool,
    /// Track image draws (source/target registers + blit markers).
    pub parse_image: bool,
    pub limits: Limits,
    pub layout: ContextLayout,
}

/// Sanity ceilings used by the decoder, the anomaly rules and the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest `Data` payload (in 8-byte units) that is consumed as payload.
    pub max_payload_units: u32,
    /// `Data` counts above this are flagged as anomalous.
    pub anomalous_payload_units: u32,
    pub max_burst_count: u32,
    pub max_sync_id: u32,
    /// Plausible GPU address window, inclusive.
    pub address_window_start: u32,
    pub address_window_end: u32,
    pub max_command_buffer_size: u32,
    pub max_init_buffer_size: u32,
}

/// Byte offsets inside the driver's root context structure and its render
/// target descriptor. These depend on the driver build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLayout {
    pub rtbuffer: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub command_buffer: [u32; 2],
    pub command_buffer_size: u32,
    pub command_offset: [u32; 2],
    pub command_buffer_current: u32,
    pub buffer: BufferLayout,
}

/// Field offsets of a buffer descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferLayout {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// 16-bit field.
    pub format: u32,
    pub memory: u32,
    pub address: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            parse_path: true,
            parse_image: true,
            limits: Limits::default(),
            layout: ContextLayout::default(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_units: 0x1000,
            anomalous_payload_units: 0x1_0000,
            max_burst_count: 64,
            max_sync_id: 31,
            address_window_start: 0x1000_0000,
            address_window_end: 0x8000_0000,
            max_command_buffer_size: 0x10_0000,
            max_init_buffer_size: 0x1_0000,
        }
    }
}

impl Default for ContextLayout {
    fn default() -> Self {
        Self {
            rtbuffer: 0x720,
            target_width: 0x7A4,
            target_height: 0x7A8,
            command_buffer: [0x0C8, 0x0CC],
            command_buffer_size: 0x0D0,
            command_offset: [0x0D4, 0x0D8],
            command_buffer_current: 0x0DC,
            buffer: BufferLayout::default(),
        }
    }
}

impl Default for BufferLayout {
    fn default() -> Self {
        Self {
            width: 0x0,
            height: 0x4,
            stride: 0x8,
            format: 0xE,
            memory: 0x14,
            address: 0x18,
        }
    }
}

impl Limits {
    pub fn in_address_window(&self, value: u32) -> bool {
        value >= self.address_window_start && value <= self.address_window_end
    }

    /// Validate ceiling values
    pub fn validate(&self) -> Result<(), String> {
        if self.max_payload_units == 0 {
            return Err("limits.max_payload_units must be > 0".to_string());
        }
        if self.anomalous_payload_units == 0 {
            return Err("limits.anomalous_payload_units must be > 0".to_string());
        }
        if self.max_command_buffer_size == 0 {
            return Err("limits.max_command_buffer_size must be > 0".to_string());
        }
        if self.max_init_buffer_size == 0 {
            return Err("limits.max_init_buffer_size must be > 0".to_string());
        }
        if self.address_window_start > self.address_window_end {
            return Err(format!(
                "limits.address_window is empty (0x{:08x} > 0x{:08x})",
                self.address_window_start, self.address_window_end
            ));
        }
        Ok(())
    }
}
