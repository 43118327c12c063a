//! Static register, blend mode and image format tables.

use std::ops::RangeInclusive;

pub const VG_CONTROL: u16 = 0x0A00;
pub const VG_TARGET_ADDRESS: u16 = 0x0A01;
pub const VG_COLOR: u16 = 0x0A02;
pub const VG_TARGET_STRIDE: u16 = 0x0A10;
pub const VG_TARGET_WIDTH: u16 = 0x0A11;
pub const VG_TARGET_HEIGHT: u16 = 0x0A12;
pub const VG_TARGET_CONFIG: u16 = 0x0A13;
pub const VG_TESS_CONTROL: u16 = 0x0A1B;
pub const VG_SOURCE_CONFIG: u16 = 0x0A25;
pub const VG_SOURCE_ADDRESS: u16 = 0x0A29;
pub const VG_SOURCE_STRIDE: u16 = 0x0A2B;
pub const VG_SOURCE_ORIGIN: u16 = 0x0A2D;
pub const VG_SOURCE_SIZE: u16 = 0x0A2F;
pub const VG_PATH_CONTROL: u16 = 0x0A34;
pub const VG_TESS_WINDOW: u16 = 0x0A39;
pub const VG_TESS_WINDOW_SIZE: u16 = 0x0A3A;
pub const VG_PATH_SCALE: u16 = 0x0A3B;
pub const VG_PATH_BIAS: u16 = 0x0A3C;
pub const VG_TESS_SIZE: u16 = 0x0A3D;
pub const VG_PATH_MATRIX_0: u16 = 0x0A40;
pub const VG_PATH_MATRIX_5: u16 = 0x0A45;

/// Register addresses accepted even when absent from the name table.
pub const VALID_REG_RANGES: [RangeInclusive<u16>; 1] = [0x0A00..=0x0AFF];

/// Registers whose value is a real memory address.
///
/// Blit step registers sharing addresses with the scissor/mask block carry
/// floats and are not listed.
pub const ADDRESS_REGISTERS: [u16; 8] = [0x0A04, 0x0A07, 0x0A08, 0x0A0C, 0x0A11, 0x0A29, 0x0A46, 0x0ACB];

/// Null pointers and debug fill patterns.
pub const SUSPICIOUS_VALUES: [u32; 4] = [0x0000_0000, 0xDEAD_BEEF, 0xCAFE_BABE, 0xFFFF_FFFF];

/// Register names, sorted by address.
static REGISTERS: &[(u16, &str)] = &[
    (0x0A00, "VgControl"),
    (0x0A01, "VgTargetAddress"),
    (0x0A02, "VgColor"),
    (0x0A03, "VgClearColor"),
    (0x0A04, "VgImageAddress"),
    (0x0A05, "VgImageConfig"),
    (0x0A06, "VgImageStride"),
    (0x0A07, "VgImageUAddress"),
    (0x0A08, "VgImageVAddress"),
    (0x0A09, "VgImageUVStride"),
    (0x0A0A, "VgImageSize"),
    (0x0A0B, "VgPaintColor"),
    (0x0A0C, "VgPatternAddress"),
    (0x0A0D, "VgPatternConfig"),
    (0x0A0E, "VgPatternStride"),
    (0x0A0F, "VgPatternSize"),
    (0x0A10, "VgTargetStride"),
    (0x0A11, "VgTargetWidth"),
    (0x0A12, "VgTargetHeight"),
    (0x0A13, "VgTargetConfig"),
    (0x0A14, "VgColorKey"),
    (0x0A15, "VgScissorLeft"),
    (0x0A16, "VgScissorTop"),
    (0x0A17, "VgScissorRight"),
    (0x0A18, "VgScissorBottom"),
    (0x0A19, "VgGlobalAlpha"),
    (0x0A1A, "VgMaskAddress"),
    (0x0A1B, "VgTessControl"),
    (0x0A1C, "VgTessCount"),
    (0x0A1D, "VgTessAddress"),
    (0x0A1E, "VgBorderColor"),
    (0x0A1F, "VgDstAlphaFactor"),
    (0x0A20, "VgBlitYStepX"),
    (0x0A21, "VgBlitYStepY"),
    (0x0A22, "VgBlitYStepZ"),
    (0x0A25, "VgSourceConfig"),
    (0x0A27, "VgSourceClip"),
    (0x0A29, "VgSourceAddress"),
    (0x0A2B, "VgSourceStride"),
    (0x0A2D, "VgSourceOrigin"),
    (0x0A2F, "VgSourceSize"),
    (0x0A30, "VgImageMatrix0"),
    (0x0A31, "VgImageMatrix1"),
    (0x0A32, "VgImageMatrix2"),
    (0x0A33, "VgImageMatrix3"),
    (0x0A34, "VgPathControl"),
    (0x0A35, "VgImageMatrix4"),
    (0x0A36, "VgImageMatrix5"),
    (0x0A37, "VgImageMatrix6"),
    (0x0A38, "VgImageMatrix7"),
    (0x0A39, "VgTessWindow"),
    (0x0A3A, "VgTessWindowSize"),
    (0x0A3B, "VgPathScale"),
    (0x0A3C, "VgPathBias"),
    (0x0A3D, "VgTessSize"),
    (0x0A40, "VgPathMatrix0"),
    (0x0A41, "VgPathMatrix1"),
    (0x0A42, "VgPathMatrix2"),
    (0x0A43, "VgPathMatrix3"),
    (0x0A44, "VgPathMatrix4"),
    (0x0A45, "VgPathMatrix5"),
    (0x0A46, "VgClutAddress"),
    (0x0A47, "VgClutConfig"),
    (0x0A50, "VgColorTransformLow"),
    (0x0A51, "VgColorTransformHigh"),
    (0x0A52, "VgColorTransformScale"),
    (0x0A53, "VgColorTransformBias"),
    (0x0A5C, "VgImageAlphaAddress"),
    (0x0A5D, "VgImageAlphaStride"),
    (0x0A90, "VgClutData0"),
    (0x0A91, "VgClutData1"),
    (0x0A92, "VgClutData2"),
    (0x0A93, "VgClutData3"),
    (0x0A94, "VgClutData4"),
    (0x0A95, "VgClutData5"),
    (0x0A96, "VgClutData6"),
    (0x0A97, "VgClutData7"),
    (0x0AC8, "VgConfig"),
    (0x0ACB, "VgMaskStride"),
    (0x0ACC, "VgMaskConfig"),
    (0x0ACD, "VgPathTransX"),
    (0x0ACE, "VgPathTransY"),
];

/// Blit transform step registers that reuse scissor/mask/tess addresses.
/// Which meaning applies depends on the draw mode, so both are reported.
static BLIT_ALIASES: &[(u16, &str, &str)] = &[
    (0x0A18, "VgBlitCStepX", "c_step[0]"),
    (0x0A19, "VgBlitCStepY", "c_step[1]"),
    (0x0A1A, "VgBlitCStepZ", "c_step[2]"),
    (0x0A1C, "VgBlitXStepX", "x_step[0]"),
    (0x0A1D, "VgBlitXStepY", "x_step[1]"),
    (0x0A1E, "VgBlitXStepZ", "x_step[2]"),
];

/// Dedicated blit step registers.
static BLIT_STEPS: &[(u16, &str)] = &[(0x0A20, "y_step[0]"), (0x0A21, "y_step[1]"), (0x0A22, "y_step[2]")];

static BLEND_MODES: &[(u32, &str)] = &[
    (0x000, "NONE"),
    (0x100, "SRC_OVER"),
    (0x200, "DST_OVER"),
    (0x300, "SRC_IN"),
    (0x400, "DST_IN"),
    (0x500, "MULTIPLY"),
    (0x600, "SCREEN"),
    (0x700, "DARKEN"),
    (0x800, "LIGHTEN"),
    (0x900, "ADDITIVE"),
    (0xA00, "SUBTRACT"),
    (0xC00, "SUBTRACT_LVGL"),
];

/// Blend mode in effect before any control register write.
pub const DEFAULT_BLEND: &str = "SRC_OVER";

static IMAGE_FORMATS: &[(u32, &str)] = &[
    (0x00, "L8"),
    (0x01, "A4"),
    (0x02, "A8"),
    (0x03, "BGRA4444"),
    (0x04, "BGRA5551"),
    (0x05, "BGR565"),
    (0x06, "BGRX8888"),
    (0x07, "BGRA8888"),
    (0x08, "YUYV/YUY2"),
    (0x09, "YV12"),
    (0x0A, "NV16"),
    (0x0B, "NV12"),
    (0x0C, "YV16"),
    (0x0D, "YV24"),
    (0x0E, "ANV12"),
    (0x0F, "AYUY2"),
    (0x13, "ABGR4444"),
    (0x14, "ABGR1555"),
    (0x15, "BGRA5551"),
    (0x16, "XBGR8888"),
    (0x17, "ABGR8888"),
    (0x21, "BGR565"),
    (0x23, "RGBA4444"),
    (0x24, "RGBA5551"),
    (0x25, "RGB565"),
    (0x26, "RGBX8888"),
    (0x27, "RGBA8888"),
    (0x33, "ARGB4444"),
    (0x34, "ARGB1555"),
    (0x35, "ARGB5551"),
    (0x36, "XRGB8888"),
    (0x37, "ARGB8888"),
];

fn lookup<K: Ord + Copy>(table: &[(K, &'static str)], key: K) -> Option<&'static str> {
    table
        .binary_search_by(|(k, _)| k.cmp(&key))
        .ok()
        .map(|i| table[i].1)
}

pub fn register_name(address: u16) -> Option<&'static str> {
    lookup(REGISTERS, address)
}

/// Blit-mode name and step label of an aliased address.
pub fn blit_alias(address: u16) -> Option<(&'static str, &'static str)> {
    BLIT_ALIASES
        .iter()
        .find(|(a, _, _)| *a == address)
        .map(|(_, name, step)| (*name, *step))
}

pub fn blit_step(address: u16) -> Option<&'static str> {
    lookup(BLIT_STEPS, address)
}

/// Name for display: `Primary/Alias` for aliased addresses, `REG_0x....`
/// for unknown ones.
pub fn display_name(address: u16) -> String {
    match (register_name(address), blit_alias(address)) {
        (Some(name), Some((alias, _))) => format!("{}/{}", name, alias),
        (Some(name), None) => name.to_string(),
        (None, Some((alias, _))) => alias.to_string(),
        (None, None) => format!("REG_0x{:04X}", address),
    }
}

pub fn is_known_register(address: u16) -> bool {
    register_name(address).is_some() || blit_alias(address).is_some()
}

pub fn in_valid_range(address: u16) -> bool {
    VALID_REG_RANGES.iter().any(|r| r.contains(&address))
}

pub fn is_address_register(address: u16) -> bool {
    ADDRESS_REGISTERS.contains(&address)
}

pub fn is_suspicious_value(value: u32) -> bool {
    SUSPICIOUS_VALUES.contains(&value)
}

/// Blend mode of a control register value (bits 8..12).
pub fn blend_mode_name(control: u32) -> String {
    let bits = control & 0x0F00;
    lookup(BLEND_MODES, bits)
        .map(str::to_string)
        .unwrap_or_else(|| format!("0x{:04X}", bits))
}

pub fn image_format_name(code: u32) -> Option<&'static str> {
    lookup(IMAGE_FORMATS, code)
}

/// Format name, or the raw code when unknown.
pub fn image_format_label(code: u32) -> String {
    image_format_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("0x{:02X}", code))
}

pub fn filter_name(bits: u32) -> &'static str {
    match bits & 0x3 {
        0 => "POINT",
        1 => "LINEAR",
        2 => "BI_LINEAR",
        _ => "GAUSSIAN",
    }
}

pub fn quality_name(bits: u32) -> &'static str {
    match bits & 0x3 {
        0 => "LOW",
        1 => "MEDIUM",
        2 => "HIGH",
        _ => "BETTER",
    }
}

/// Slot in the row-major 3×3 image matrix written by an image matrix
/// register. 0x0A34 sits in the middle of the block and is not a slot.
pub fn image_matrix_slot(address: u16) -> Option<usize> {
    match address {
        0x0A30..=0x0A33 => Some(usize::from(address - 0x0A30)),
        0x0A35..=0x0A38 => Some(usize::from(address - 0x0A31)),
        _ => None,
    }
}

/// `(row, column)` of a path matrix register.
pub fn path_matrix_cell(address: u16) -> Option<(usize, usize)> {
    if (VG_PATH_MATRIX_0..=VG_PATH_MATRIX_5).contains(&address) {
        let idx = usize::from(address - VG_PATH_MATRIX_0);
        Some((idx / 3, idx % 3))
    } else {
        None
    }
}
