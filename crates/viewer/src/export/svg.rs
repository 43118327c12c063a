//! SVG rendering of decoded paths.

use std::fmt::Write;

use cmdbuf::decode::PathContext;
use cmdbuf::path::{PathOpcode, PathSegment};

use super::dedup::Shape;

const EPSILON: f32 = 1e-4;

/// Path `d` attribute for one decoded path, with scale and bias applied.
/// Truncated segments are skipped.
pub fn path_data(segments: &[PathSegment], context: &PathContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    for segment in segments {
        if segment.is_truncated() {
            continue;
        }
        let c: Vec<f64> = segment.coords.iter().map(|v| context.transform_coord(*v)).collect();
        let part = match segment.opcode {
            PathOpcode::End | PathOpcode::Break => continue,
            PathOpcode::Close => "Z".to_string(),
            PathOpcode::Move => points("M", &c),
            PathOpcode::MoveRel => points("m", &c),
            PathOpcode::Line => points("L", &c),
            PathOpcode::LineRel => points("l", &c),
            PathOpcode::Quad => points("Q", &c),
            PathOpcode::QuadRel => points("q", &c),
            PathOpcode::Cubic => points("C", &c),
            PathOpcode::CubicRel => points("c", &c),
            PathOpcode::Hline => points("H", &c),
            PathOpcode::HlineRel => points("h", &c),
            PathOpcode::Vline => points("V", &c),
            PathOpcode::VlineRel => points("v", &c),
            PathOpcode::Squad => points("T", &c),
            PathOpcode::SquadRel => points("t", &c),
            PathOpcode::Scubic => points("S", &c),
            PathOpcode::ScubicRel => points("s", &c),
            op => arc(op, &segment.coords, context),
        };
        parts.push(part);
    }

    parts.join(" ")
}

fn points(command: &str, coords: &[f64]) -> String {
    let mut out = command.to_string();
    for value in coords {
        let _ = write!(out, " {:.2}", value);
    }
    out
}

/// Arc operands are `rh rv rot x y`: radii are scaled, the rotation is
/// taken as is, the end point gets scale and bias.
fn arc(op: PathOpcode, raw: &[f64], context: &PathContext) -> String {
    let (large, sweep) = match op {
        PathOpcode::Sccwarc | PathOpcode::SccwarcRel => (0, 0),
        PathOpcode::Scwarc | PathOpcode::ScwarcRel => (0, 1),
        PathOpcode::Lccwarc | PathOpcode::LccwarcRel => (1, 0),
        _ => (1, 1),
    };
    let command = if op.is_relative() { "a" } else { "A" };
    let scale = f64::from(context.scale);
    format!(
        "{} {:.2} {:.2} {:.2} {} {} {:.2} {:.2}",
        command,
        raw[0] * scale,
        raw[1] * scale,
        raw[2],
        large,
        sweep,
        context.transform_coord(raw[3]),
        context.transform_coord(raw[4]),
    )
}

/// `transform` attribute for a 2×3 path matrix. Identity needs none, and a
/// matrix that collapses an axis would hide the shape, so both are dropped.
pub fn transform_attr(matrix: &[[f32; 3]; 2]) -> Option<String> {
    let [[m00, m01, m02], [m10, m11, m12]] = *matrix;
    let zero = |v: f32| v.abs() < EPSILON;

    if (zero(m00) && zero(m01)) || (zero(m10) && zero(m11)) {
        return None;
    }
    if zero(m00 - 1.0) && zero(m11 - 1.0) && zero(m01) && zero(m10) && zero(m02) && zero(m12) {
        return None;
    }
    Some(format!(
        "matrix({:.6} {:.6} {:.6} {:.6} {:.2} {:.2})",
        m00, m10, m01, m11, m02, m12
    ))
}

/// ARGB color as `rgb(r,g,b)` plus opacity.
pub fn fill(color: u32) -> (String, f64) {
    let a = (color >> 24) & 0xFF;
    let r = (color >> 16) & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = color & 0xFF;
    (format!("rgb({},{},{})", r, g, b), f64::from(a) / 255.0)
}

fn shape_element(index: usize, shape: &Shape) -> String {
    let (color, opacity) = fill(shape.color);
    let mut element = format!(
        "<path d=\"{}\" fill=\"{}\" fill-opacity=\"{:.2}\" fill-rule=\"{}\"",
        shape.d,
        color,
        opacity,
        shape.fill_rule.svg_keyword()
    );
    if let Some(transform) = &shape.transform {
        let _ = write!(element, " transform=\"{}\"", transform);
    }
    let _ = write!(
        element,
        " data-index=\"{}\" data-offset=\"0x{:04X}\" data-segment=\"{}\" data-count=\"{}\"",
        index,
        shape.offset,
        escape(&shape.segment),
        shape.count
    );
    if !shape.window.is_empty() {
        let w = &shape.window;
        let _ = write!(element, " data-window=\"{} {} {} {}\"", w.x, w.y, w.width, w.height);
    }
    element.push_str("/>");
    element
}

/// Full SVG document.
pub fn render_svg(shapes: &[Shape], width: u32, height: u32, background: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&svg_element(shapes, width, height, background));
    out
}

/// The `<svg>` element without the XML declaration, for embedding.
pub fn svg_element(shapes: &[Shape], width: u32, height: u32, background: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = width,
        h = height
    );
    let _ = writeln!(out, "  <rect width=\"100%\" height=\"100%\" fill=\"{}\"/>", escape(background));
    out.push_str("  <g id=\"paths\">\n");
    for (index, shape) in shapes.iter().enumerate() {
        let _ = writeln!(out, "    {}", shape_element(index, shape));
    }
    out.push_str("  </g>\n</svg>\n");
    out
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
