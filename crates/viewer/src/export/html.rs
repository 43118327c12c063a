//! Self-contained HTML page around the exported SVG.

use std::fmt::Write;

use super::dedup::Shape;
use super::svg::{escape, svg_element};

const STYLE: &str = "\
body { font-family: sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
.canvas { display: inline-block; background: white; border: 1px solid #ddd; padding: 12px; }
svg path { cursor: pointer; }
svg path:hover, svg path.selected { stroke: #00ff00; stroke-width: 2; vector-effect: non-scaling-stroke; }
table { border-collapse: collapse; margin-top: 16px; font-size: 12px; }
td, th { border: 1px solid #ccc; padding: 2px 6px; text-align: left; }
code { word-break: break-all; }
";

const SCRIPT: &str = "\
document.querySelectorAll('svg path').forEach(function (path) {
  path.addEventListener('click', function () {
    document.querySelectorAll('svg path.selected').forEach(function (p) { p.classList.remove('selected'); });
    path.classList.add('selected');
    document.getElementById('selection').textContent =
      '#' + path.dataset.index + ' @ ' + path.dataset.offset + ' ' + path.getAttribute('d').slice(0, 200);
  });
});
";

pub fn render_html(title: &str, shapes: &[Shape], width: u32, height: u32, background: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape(title));
    let _ = writeln!(out, "<style>\n{}</style>\n</head>\n<body>", STYLE);
    let _ = writeln!(out, "<h1>{}</h1>", escape(title));
    let _ = writeln!(
        out,
        "<p>{} shapes from {} draws, canvas {} x {}</p>",
        shapes.len(),
        shapes.iter().map(|s| s.count).sum::<usize>(),
        width,
        height
    );
    out.push_str("<div class=\"canvas\">\n");
    out.push_str(&svg_element(shapes, width, height, background));
    out.push_str("</div>\n<p><code id=\"selection\"></code></p>\n");

    out.push_str("<table>\n<tr><th>#</th><th>segment</th><th>offset</th><th>draws</th><th>window</th></tr>\n");
    for (index, shape) in shapes.iter().enumerate() {
        let window = if shape.window.is_empty() {
            "-".to_string()
        } else {
            let w = &shape.window;
            format!("({}, {}) {} x {}", w.x, w.y, w.width, w.height)
        };
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>0x{:04X}</td><td>{}</td><td>{}</td></tr>",
            index,
            escape(&shape.segment),
            shape.offset,
            shape.count,
            window
        );
    }
    out.push_str("</table>\n");
    let _ = writeln!(out, "<script>\n{}</script>\n</body>\n</html>", SCRIPT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbuf::decode::{FillRule, TessWindow};

    #[test]
    fn test_html_embeds_svg_without_declaration() {
        let shape = Shape {
            d: "M 0.00 0.00 Z".to_string(),
            color: 0xFFFF_FFFF,
            fill_rule: FillRule::NonZero,
            transform: None,
            window: TessWindow::default(),
            offset: 8,
            segment: "backup command buffer".to_string(),
            count: 3,
        };
        let html = render_html("crash.core", &[shape], 466, 466, "#000000");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains("<?xml"));
        assert!(html.contains("<svg xmlns="));
        assert!(html.contains("1 shapes from 3 draws, canvas 466 x 466"));
        assert!(html.contains("<td>0x0008</td><td>3</td><td>-</td>"));
    }
}
