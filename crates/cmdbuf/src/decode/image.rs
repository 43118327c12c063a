use serde::{Deserialize, Serialize};

use super::context::{ImageAccumulator, IDENTITY_3X3};

const EPSILON: f32 = 1e-4;

/// One finalized image blit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDraw {
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
    /// Row-major 3×3 transform, copied at finalization.
    pub matrix: [f32; 9],
    pub blend_mode: String,
    /// Offset of the blit marker.
    pub offset: u32,
    pub segment: String,
}

fn near(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

impl ImageDraw {
    pub fn snapshot(image: &ImageAccumulator, matrix: &[f32; 9], blend: &str, offset: u32, segment: &str) -> Self {
        Self {
            src_address: image.src_address,
            src_format: image.src_format.clone(),
            src_format_raw: image.src_format_raw,
            src_width: image.src_width,
            src_height: image.src_height,
            src_stride: image.src_stride,
            dst_address: image.dst_address,
            dst_format: image.dst_format.clone(),
            dst_format_raw: image.dst_format_raw,
            dst_width: image.dst_width,
            dst_height: image.dst_height,
            dst_stride: image.dst_stride,
            matrix: *matrix,
            blend_mode: blend.to_string(),
            offset,
            segment: segment.to_string(),
        }
    }

    /// Short human form of the transform.
    pub fn matrix_summary(&self) -> String {
        let m = &self.matrix;
        if m.iter().zip(IDENTITY_3X3.iter()).all(|(a, b)| near(*a, *b)) {
            return "Identity".to_string();
        }

        let (tx, ty) = (m[2], m[5]);
        let axis_aligned = near(m[1], 0.0) && near(m[3], 0.0);
        if axis_aligned && near(m[0], 1.0) && near(m[4], 1.0) {
            return format!("Translate({:.1}, {:.1})", tx, ty);
        }
        if axis_aligned {
            if near(tx, 0.0) && near(ty, 0.0) {
                return format!("Scale({:.3}, {:.3})", m[0], m[4]);
            }
            return format!("Scale({:.3}, {:.3})+Translate({:.1}, {:.1})", m[0], m[4], tx, ty);
        }

        format!(
            "[{:.3}, {:.3}, {:.1}; {:.3}, {:.3}, {:.1}]",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }

    /// Size of the source image in memory, 0 when unknown.
    pub fn source_bytes(&self) -> u64 {
        u64::from(self.src_stride) * u64::from(self.src_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_with(matrix: [f32; 9]) -> ImageDraw {
        let mut image = ImageAccumulator::default();
        image.src_address = 0x2000_0000;
        image.src_stride = 256;
        image.src_height = 32;
        ImageDraw::snapshot(&image, &matrix, "SRC_OVER", 0x40, "seg")
    }

    #[test]
    fn test_identity() {
        assert_eq!(draw_with(IDENTITY_3X3).matrix_summary(), "Identity");
        assert_eq!(
            draw_with([1.00001, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).matrix_summary(),
            "Identity"
        );
    }

    #[test]
    fn test_translate() {
        let d = draw_with([1.0, 0.0, 10.0, 0.0, 1.0, -20.5, 0.0, 0.0, 1.0]);
        assert_eq!(d.matrix_summary(), "Translate(10.0, -20.5)");
    }

    #[test]
    fn test_scale_forms() {
        let d = draw_with([2.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(d.matrix_summary(), "Scale(2.000, 0.500)");
        let d = draw_with([2.0, 0.0, 3.0, 0.0, 2.0, 4.0, 0.0, 0.0, 1.0]);
        assert_eq!(d.matrix_summary(), "Scale(2.000, 2.000)+Translate(3.0, 4.0)");
    }

    #[test]
    fn test_general() {
        let d = draw_with([0.0, -1.0, 466.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(d.matrix_summary(), "[0.000, -1.000, 466.0; 1.000, 0.000, 0.0]");
    }

    #[test]
    fn test_source_bytes() {
        assert_eq!(draw_with(IDENTITY_3X3).source_bytes(), 256 * 32);
    }
}
