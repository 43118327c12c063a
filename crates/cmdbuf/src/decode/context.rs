//! Register context: the subset of GPU state that affects how later
//! commands and payloads are interpreted.

use serde::{Deserialize, Serialize};

use super::register::{self as reg, DEFAULT_BLEND};
use crate::path::PathFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    /// SVG `fill-rule` keyword.
    pub fn svg_keyword(&self) -> &'static str {
        match self {
            FillRule::NonZero => "nonzero",
            FillRule::EvenOdd => "evenodd",
        }
    }
}

/// Tessellation window rectangle in target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TessWindow {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl TessWindow {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle covering both windows. Empty windows are ignored.
    pub fn union(&self, other: &TessWindow) -> TessWindow {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (u32::from(self.x) + u32::from(self.width)).max(u32::from(other.x) + u32::from(other.width));
        let y1 = (u32::from(self.y) + u32::from(self.height)).max(u32::from(other.y) + u32::from(other.height));
        TessWindow {
            x: x0,
            y: y0,
            width: (x1 - u32::from(x0)).min(u32::from(u16::MAX)) as u16,
            height: (y1 - u32::from(y0)).min(u32::from(u16::MAX)) as u16,
        }
    }
}

/// Path state captured when a payload is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathContext {
    pub format: PathFormat,
    pub quality: String,
    pub fill_rule: FillRule,
    pub stroke: bool,
    pub scale: f32,
    pub bias: f32,
    /// 2×3 affine transform, row-major.
    pub matrix: [[f32; 3]; 2],
    /// ARGB.
    pub color: u32,
    pub tess_window: TessWindow,
}

impl Default for PathContext {
    fn default() -> Self {
        Self {
            format: PathFormat::Fp32,
            quality: "LOW".to_string(),
            fill_rule: FillRule::NonZero,
            stroke: false,
            scale: 1.0,
            bias: 0.0,
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            color: 0xFFFF_FFFF,
            tess_window: TessWindow::default(),
        }
    }
}

impl PathContext {
    /// Apply scale and bias to a raw coordinate.
    pub fn transform_coord(&self, value: f64) -> f64 {
        value * f64::from(self.scale) + f64::from(self.bias)
    }
}

/// Source and target registers collected for the next image blit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAccumulator {
    pub src_address: u32,
    pub src_format: String,
    pub src_format_raw: u32,
    pub src_width: u32,
    pub src_height: u32,
    pub src_stride: u32,
    pub dst_address: u32,
    pub dst_format: String,
    pub dst_format_raw: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    pub dst_stride: u32,
}

impl Default for ImageAccumulator {
    fn default() -> Self {
        Self {
            src_address: 0,
            src_format: "UNKNOWN".to_string(),
            src_format_raw: 0,
            src_width: 0,
            src_height: 0,
            src_stride: 0,
            dst_address: 0,
            dst_format: "UNKNOWN".to_string(),
            dst_format_raw: 0,
            dst_width: 0,
            dst_height: 0,
            dst_stride: 0,
        }
    }
}

pub const IDENTITY_3X3: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterContext {
    pub path: PathContext,
    /// Row-major 3×3 image transform.
    pub image_matrix: [f32; 9],
    pub blend: String,
    pub image: ImageAccumulator,
}

impl Default for RegisterContext {
    fn default() -> Self {
        Self {
            path: PathContext::default(),
            image_matrix: IDENTITY_3X3,
            blend: DEFAULT_BLEND.to_string(),
            image: ImageAccumulator::default(),
        }
    }
}

fn as_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

fn low_high(data: u32) -> (u16, u16) {
    ((data & 0xFFFF) as u16, (data >> 16) as u16)
}

impl RegisterContext {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Decode a single register write into detail strings and fold it into
    /// the context. Image-draw state is only touched when `track_image`.
    pub fn apply_write(&mut self, address: u16, data: u32, track_image: bool) -> Vec<String> {
        let mut details = Vec::new();

        match address {
            reg::VG_CONTROL => {
                let blend = reg::blend_mode_name(data);
                details.push(format!("blend: {}", blend));
                if track_image {
                    self.blend = blend;
                }
                for (bit, label) in [
                    (0x01, "tiled"),
                    (0x40, "scissor enabled"),
                    (0x80, "mask enabled"),
                    (0x10_0000, "color transform enabled"),
                    (0x20_0000, "matrix enabled"),
                ] {
                    if data & bit != 0 {
                        details.push(label.to_string());
                    }
                }
            }
            reg::VG_COLOR => {
                let [a, r, g, b] = data.to_be_bytes();
                details.push(format!("color: ARGB({}, {}, {}, {}) / #{:08X}", a, r, g, b, data));
                self.path.color = data;
            }
            reg::VG_PATH_CONTROL => {
                self.path.format = PathFormat::from_control_bits(data >> 20);
                self.path.quality = reg::quality_name(data >> 24).to_string();
                self.path.fill_rule = if data & 0x10 != 0 { FillRule::EvenOdd } else { FillRule::NonZero };
                self.path.stroke = data & 0x200 != 0;

                details.push(format!("path format: {}", self.path.format));
                details.push(format!("quality: {}", self.path.quality));
                details.push(match self.path.fill_rule {
                    FillRule::EvenOdd => "fill rule: even-odd".to_string(),
                    FillRule::NonZero => "fill rule: non-zero".to_string(),
                });
                if self.path.stroke {
                    details.push("stroke".to_string());
                }
            }
            reg::VG_TESS_WINDOW => {
                let (x, y) = low_high(data);
                details.push(format!("tess window origin: ({}, {})", x, y));
                self.path.tess_window.x = x;
                self.path.tess_window.y = y;
            }
            reg::VG_TESS_WINDOW_SIZE => {
                let (w, h) = low_high(data);
                details.push(format!("tess window size: {} x {}", w, h));
                self.path.tess_window.width = w;
                self.path.tess_window.height = h;
            }
            reg::VG_PATH_SCALE => {
                self.path.scale = as_f32(data);
                details.push(format!("path scale: {:?}", self.path.scale));
            }
            reg::VG_PATH_BIAS => {
                self.path.bias = as_f32(data);
                details.push(format!("path bias: {:?}", self.path.bias));
            }
            reg::VG_TARGET_ADDRESS => {
                details.push(format!("target address: 0x{:08X}", data));
                if track_image {
                    self.image.dst_address = data;
                }
            }
            reg::VG_SOURCE_ADDRESS => {
                details.push(format!("source address: 0x{:08X}", data));
                if track_image {
                    self.image.src_address = data;
                }
            }
            reg::VG_TARGET_STRIDE => {
                details.push(format!("target stride: {} bytes", data));
                if track_image {
                    self.image.dst_stride = data;
                }
            }
            reg::VG_TARGET_WIDTH => {
                details.push(format!("target width: {}", data));
                if track_image {
                    self.image.dst_width = data;
                }
            }
            reg::VG_TARGET_HEIGHT => {
                details.push(format!("target height: {}", data));
                if track_image {
                    self.image.dst_height = data;
                }
            }
            reg::VG_TARGET_CONFIG => {
                let code = data & 0x3F;
                let name = reg::image_format_label(code);
                details.push(format!("target format: {}", name));
                if track_image {
                    self.image.dst_format = name;
                    self.image.dst_format_raw = code;
                }
            }
            reg::VG_SOURCE_CONFIG => {
                let code = data & 0x3F;
                let name = reg::image_format_label(code);
                details.push(format!("source format: {}, filter: {}", name, reg::filter_name(data >> 16)));
                if track_image {
                    self.image.src_format = name;
                    self.image.src_format_raw = code;
                }
            }
            reg::VG_SOURCE_STRIDE => {
                let stride = data & 0x0FFF_FFFF;
                let tiled = if (data >> 28) & 1 != 0 { ", tiled" } else { "" };
                details.push(format!("source stride: {} bytes{}", stride, tiled));
                if track_image {
                    self.image.src_stride = stride;
                }
            }
            reg::VG_SOURCE_ORIGIN => {
                let (x, y) = low_high(data);
                details.push(format!("source origin: ({}, {})", x, y));
            }
            reg::VG_SOURCE_SIZE => {
                let (w, h) = low_high(data);
                details.push(format!("source size: {} x {}", w, h));
                if track_image {
                    self.image.src_width = u32::from(w);
                    self.image.src_height = u32::from(h);
                }
            }
            reg::VG_TESS_CONTROL => details.push(format!("tess control: 0x{:08X}", data)),
            reg::VG_TESS_SIZE => details.push(format!("tess buffer: {} bytes", u64::from(data) * 64)),
            _ => {
                if let Some((row, col)) = reg::path_matrix_cell(address) {
                    let value = as_f32(data);
                    details.push(format!("path matrix[{}][{}]: {:?}", row, col, value));
                    self.path.matrix[row][col] = value;
                } else if let Some(slot) = reg::image_matrix_slot(address) {
                    let value = as_f32(data);
                    details.push(format!("image matrix[{}]: {:?}", slot, value));
                    if track_image {
                        self.image_matrix[slot] = value;
                    }
                } else if let Some(step) = reg::blit_step(address) {
                    details.push(format!("blit {}: {:?}", step, as_f32(data)));
                } else {
                    details.push(format!("data: 0x{:08X}", data));
                }
            }
        }

        if let Some((alias, step)) = reg::blit_alias(address) {
            details.push(format!("as {} (blit {}): {:?}", alias, step, as_f32(data)));
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(ctx: &mut RegisterContext, address: u16, data: u32) -> Vec<String> {
        ctx.apply_write(address, data, true)
    }

    #[test]
    fn test_control_blend_and_flags() {
        let mut ctx = RegisterContext::default();
        ctx.blend = "NONE".to_string();
        let details = apply(&mut ctx, 0x0A00, 0x0030_01C1);
        assert_eq!(details[0], "blend: SRC_OVER");
        assert!(details.contains(&"tiled".to_string()));
        assert!(details.contains(&"scissor enabled".to_string()));
        assert!(details.contains(&"mask enabled".to_string()));
        assert!(details.contains(&"color transform enabled".to_string()));
        assert!(details.contains(&"matrix enabled".to_string()));
        assert_eq!(ctx.blend, "SRC_OVER");
    }

    #[test]
    fn test_color_unpacking() {
        let mut ctx = RegisterContext::default();
        let details = apply(&mut ctx, 0x0A02, 0x80FF_4000);
        assert_eq!(details, vec!["color: ARGB(128, 255, 64, 0) / #80FF4000"]);
        assert_eq!(ctx.path.color, 0x80FF_4000);
    }

    #[test]
    fn test_path_control() {
        let mut ctx = RegisterContext::default();
        let details = apply(&mut ctx, 0x0A34, 0x0210_0210);
        assert_eq!(ctx.path.format, PathFormat::S16);
        assert_eq!(ctx.path.quality, "HIGH");
        assert_eq!(ctx.path.fill_rule, FillRule::EvenOdd);
        assert!(ctx.path.stroke);
        assert_eq!(details[0], "path format: S16");
        assert_eq!(details.last().map(String::as_str), Some("stroke"));
    }

    #[test]
    fn test_scale_bias_and_matrix_are_floats() {
        let mut ctx = RegisterContext::default();
        apply(&mut ctx, 0x0A3B, 2.5f32.to_bits());
        let bias = apply(&mut ctx, 0x0A3C, (-1.0f32).to_bits());
        assert_eq!(bias, vec!["path bias: -1.0"]);
        apply(&mut ctx, 0x0A42, 10.0f32.to_bits());
        apply(&mut ctx, 0x0A45, 20.0f32.to_bits());
        assert_eq!(ctx.path.scale, 2.5);
        assert_eq!(ctx.path.matrix, [[1.0, 0.0, 10.0], [0.0, 1.0, 20.0]]);
        assert_eq!(ctx.path.transform_coord(4.0), 9.0);
    }

    #[test]
    fn test_image_matrix_skips_path_control_slot() {
        let mut ctx = RegisterContext::default();
        apply(&mut ctx, 0x0A32, 5.0f32.to_bits());
        apply(&mut ctx, 0x0A35, 2.0f32.to_bits());
        apply(&mut ctx, 0x0A36, 7.0f32.to_bits());
        assert_eq!(ctx.image_matrix, [1.0, 0.0, 5.0, 0.0, 2.0, 7.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_tess_window() {
        let mut ctx = RegisterContext::default();
        apply(&mut ctx, 0x0A39, 0x0020_0010);
        let details = apply(&mut ctx, 0x0A3A, 0x0040_0080);
        assert_eq!(details, vec!["tess window size: 128 x 64"]);
        assert_eq!(
            ctx.path.tess_window,
            TessWindow { x: 16, y: 32, width: 128, height: 64 }
        );
    }

    #[test]
    fn test_image_registers_tracked_only_when_enabled() {
        let mut ctx = RegisterContext::default();
        ctx.apply_write(0x0A29, 0x2000_0000, false);
        assert_eq!(ctx.image.src_address, 0);

        apply(&mut ctx, 0x0A29, 0x2000_0000);
        apply(&mut ctx, 0x0A25, 0x0001_0037);
        apply(&mut ctx, 0x0A2B, 0x1000_0100);
        apply(&mut ctx, 0x0A2F, 0x0020_0040);
        assert_eq!(ctx.image.src_address, 0x2000_0000);
        assert_eq!(ctx.image.src_format, "ARGB8888");
        assert_eq!(ctx.image.src_stride, 0x100);
        assert_eq!((ctx.image.src_width, ctx.image.src_height), (64, 32));
    }

    #[test]
    fn test_source_details() {
        let mut ctx = RegisterContext::default();
        assert_eq!(apply(&mut ctx, 0x0A25, 0x0001_0037), vec!["source format: ARGB8888, filter: LINEAR"]);
        assert_eq!(apply(&mut ctx, 0x0A2B, 0x1000_0100), vec!["source stride: 256 bytes, tiled"]);
        assert_eq!(apply(&mut ctx, 0x0A3D, 2), vec!["tess buffer: 128 bytes"]);
    }

    #[test]
    fn test_aliased_register_reports_both_meanings() {
        let mut ctx = RegisterContext::default();
        let details = apply(&mut ctx, 0x0A18, 1.0f32.to_bits());
        assert_eq!(details.len(), 2);
        assert_eq!(details[0], "data: 0x3F800000");
        assert_eq!(details[1], "as VgBlitCStepX (blit c_step[0]): 1.0");
    }

    #[test]
    fn test_unknown_register_generic_detail() {
        let mut ctx = RegisterContext::default();
        assert_eq!(apply(&mut ctx, 0x0AF0, 0x1234), vec!["data: 0x00001234"]);
    }

    #[test]
    fn test_window_union() {
        let a = TessWindow { x: 0, y: 0, width: 10, height: 10 };
        let b = TessWindow { x: 5, y: 20, width: 10, height: 5 };
        assert_eq!(a.union(&b), TessWindow { x: 0, y: 0, width: 15, height: 25 });
        assert_eq!(TessWindow::default().union(&b), b);
    }

    #[test]
    fn test_reset() {
        let mut ctx = RegisterContext::default();
        apply(&mut ctx, 0x0A34, 0x0000_0000);
        apply(&mut ctx, 0x0A29, 0x2000_0000);
        ctx.reset();
        assert_eq!(ctx, RegisterContext::default());
        assert_eq!(ctx.path.format, PathFormat::Fp32);
    }
}
