//! Shape collection with tessellation-window deduplication.
//!
//! The driver splits large targets into tessellation windows and replays the
//! same path once per window. Those replays are collapsed into one shape by
//! hashing the encoded segments together with everything that affects how
//! the shape is drawn; the declared windows are merged into a union box.

use std::collections::HashMap;

use cmdbuf::decode::{DecodeSession, DecodedPath, FillRule, TessWindow};
use cmdbuf::path::{encode_path, PathFormat};

use super::svg::{path_data, transform_attr};

/// One `<path>` element of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub d: String,
    /// ARGB.
    pub color: u32,
    pub fill_rule: FillRule,
    pub transform: Option<String>,
    /// Union of the windows this shape was drawn in.
    pub window: TessWindow,
    /// Offset of the first instruction that drew it.
    pub offset: u32,
    pub segment: String,
    /// Number of times the same shape was drawn.
    pub count: usize,
}

fn content_hash(path: &DecodedPath) -> blake3::Hash {
    let ctx = &path.context;
    let mut hasher = blake3::Hasher::new();
    // FP32 keeps every source format's coordinates exact.
    hasher.update(&encode_path(&path.segments, PathFormat::Fp32));
    hasher.update(&ctx.color.to_le_bytes());
    hasher.update(&[ctx.fill_rule as u8]);
    hasher.update(&ctx.scale.to_bits().to_le_bytes());
    hasher.update(&ctx.bias.to_bits().to_le_bytes());
    for row in &ctx.matrix {
        for value in row {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    hasher.finalize()
}

/// Collect one shape per decoded path, in command order. With `merge`,
/// repeated shapes are folded into their first occurrence.
pub fn collect_shapes(session: &DecodeSession, merge: bool) -> Vec<Shape> {
    let mut shapes: Vec<Shape> = Vec::new();
    let mut seen: HashMap<blake3::Hash, usize> = HashMap::new();

    for segment in &session.segments {
        for instruction in &segment.instructions {
            let Some(path) = &instruction.path else {
                continue;
            };
            let d = path_data(&path.segments, &path.context);
            if d.is_empty() {
                continue;
            }

            if merge {
                let key = content_hash(path);
                if let Some(&index) = seen.get(&key) {
                    let shape = &mut shapes[index];
                    shape.window = shape.window.union(&path.context.tess_window);
                    shape.count += 1;
                    continue;
                }
                seen.insert(key, shapes.len());
            }

            shapes.push(Shape {
                d,
                color: path.context.color,
                fill_rule: path.context.fill_rule,
                transform: transform_attr(&path.context.matrix),
                window: path.context.tess_window,
                offset: instruction.offset,
                segment: segment.name.clone(),
                count: 1,
            });
        }
    }

    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbuf::decode::CommandDecoder;

    /// Same S16 square drawn in two windows, then once in another color.
    const TILED_LOG: &str = "\
0x30010A34 0x00100000
0x30010A02 0xFF00FF00
0x30010A39 0x00000000
0x30010A3A 0x00100010
0x40000003 0x00000000
0x00000002 0x00040000
0x00000010 0x00100004
0x00010010 0x00000000
0x30010A39 0x00000010
0x40000003 0x00000000
0x00000002 0x00040000
0x00000010 0x00100004
0x00010010 0x00000000
0x30010A02 0xFFFF0000
0x40000003 0x00000000
0x00000002 0x00040000
0x00000010 0x00100004
0x00010010 0x00000000
";

    #[test]
    fn test_merge_collapses_repeated_windows() {
        let session = CommandDecoder::default().decode_log(TILED_LOG);
        let shapes = collect_shapes(&session, true);
        assert_eq!(shapes.len(), 2);

        assert_eq!(shapes[0].count, 2);
        assert_eq!(shapes[0].color, 0xFF00_FF00);
        assert_eq!(
            shapes[0].window,
            TessWindow {
                x: 0,
                y: 0,
                width: 32,
                height: 16
            }
        );
        assert_eq!(shapes[1].color, 0xFFFF_0000);
        assert_eq!(shapes[1].count, 1);
    }

    #[test]
    fn test_without_merge_every_path_is_kept() {
        let session = CommandDecoder::default().decode_log(TILED_LOG);
        let shapes = collect_shapes(&session, false);
        assert_eq!(shapes.len(), 3);
        assert!(shapes.iter().all(|s| s.count == 1));
        assert_eq!(shapes[0].d, "M 0.00 0.00 L 16.00 0.00 L 16.00 16.00 Z");
        assert_eq!(shapes[0].d, shapes[1].d);
    }

    #[test]
    fn test_empty_session_has_no_shapes() {
        assert!(collect_shapes(&DecodeSession::default(), true).is_empty());
    }
}
