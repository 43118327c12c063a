//! Plain-text rendering of a [`Report`].

use std::fmt::Write;

use super::model::{ImageStats, Report};
use crate::decode::{CommandSegment, DecodedInstruction, ImageDraw, OpcodeClass};

/// Anomalies listed in the summary before the rest is elided.
const MAX_LISTED_ANOMALIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// Print register detail lines under each instruction.
    pub verbose: bool,
    pub show_paths: bool,
    pub show_images: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            show_paths: true,
            show_images: true,
        }
    }
}

fn size_label(bytes: u64) -> String {
    if bytes >= 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}B", bytes)
    }
}

fn hex_or_dash(value: Option<u32>) -> String {
    value.map(|v| format!("0x{:08X}", v)).unwrap_or_else(|| "-".to_string())
}

fn counts_line<K: std::fmt::Display>(counts: impl IntoIterator<Item = (K, usize)>) -> String {
    counts
        .into_iter()
        .map(|(k, n)| format!("{}:{}", k, n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn image_line(draw: &ImageDraw) -> String {
    let mut parts = Vec::new();
    if draw.src_address != 0 {
        parts.push(format!("src 0x{:08X}", draw.src_address));
    }
    if draw.src_format != "UNKNOWN" {
        parts.push(draw.src_format.clone());
    }
    if draw.src_width != 0 && draw.src_height != 0 {
        parts.push(format!("{}x{}", draw.src_width, draw.src_height));
    }
    if draw.src_stride != 0 {
        parts.push(format!("stride {}", draw.src_stride));
    }
    let bytes = draw.source_bytes();
    if bytes > 0 {
        parts.push(format!("({})", size_label(bytes)));
    }
    if draw.blend_mode != "SRC_OVER" {
        parts.push(format!("blend {}", draw.blend_mode));
    }
    let matrix = draw.matrix_summary();
    if matrix != "Identity" {
        parts.push(format!("transform {}", matrix));
    }
    parts.join(" ")
}

fn write_instruction(out: &mut String, report: &Report, instruction: &DecodedInstruction, options: &TextOptions) {
    let mark = if instruction.is_anomalous() { "!" } else { " " };
    let _ = writeln!(
        out,
        "{}{:04X}  {}  {:<9} {}",
        mark, instruction.offset, instruction.word, instruction.class, instruction.description
    );

    if options.verbose {
        for detail in &instruction.details {
            let _ = writeln!(out, "        - {}", detail);
        }
    }

    if options.show_paths && matches!(instruction.class, OpcodeClass::Data | OpcodeClass::Call) {
        let segments = instruction.path_segments();
        if !segments.is_empty() {
            let _ = writeln!(out, "        path ({} segments):", segments.len());
            for segment in segments {
                let _ = writeln!(out, "          {}", segment);
            }
        }
    }

    if options.show_images {
        if let Some(draw) = instruction.image_draw.and_then(|i| report.session.image_draws.get(i)) {
            let line = image_line(draw);
            if !line.is_empty() {
                let _ = writeln!(out, "        image: {}", line);
            }
        }
    }

    for anomaly in &instruction.anomalies {
        let _ = writeln!(out, "        ! {}", anomaly);
    }
}

fn write_segment(out: &mut String, report: &Report, segment: &CommandSegment, options: &TextOptions) {
    let _ = write!(out, "== {}", segment.name);
    if segment.address.is_some() || segment.size.is_some() {
        let _ = write!(out, " (address {}, size {})", hex_or_dash(segment.address), hex_or_dash(segment.size));
    }
    let _ = writeln!(out, " ==");

    for instruction in &segment.instructions {
        write_instruction(out, report, instruction, options);
    }
    out.push('\n');
}

fn write_summary(out: &mut String, report: &Report) {
    let _ = writeln!(out, "== summary ==");
    for stats in report.segment_stats() {
        let anomalous = if stats.anomalous > 0 {
            stats.anomalous.to_string()
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{}: {} ({} total), anomalies: {}",
            stats.name,
            counts_line(stats.classes),
            stats.total,
            anomalous
        );
    }

    let anomalous: Vec<(&str, &DecodedInstruction)> = report
        .session
        .segments
        .iter()
        .flat_map(|s| s.anomalous().map(move |i| (s.name.as_str(), i)))
        .collect();
    if !anomalous.is_empty() {
        let _ = writeln!(out, "\nanomalous instructions ({}):", anomalous.len());
        for (segment, instruction) in anomalous.iter().take(MAX_LISTED_ANOMALIES) {
            let reasons: Vec<String> = instruction.anomalies.iter().map(ToString::to_string).collect();
            let _ = writeln!(
                out,
                "  {} @{:04X}  {}  {}: {}",
                segment,
                instruction.offset,
                instruction.word,
                instruction.class,
                reasons.join("; ")
            );
        }
        if anomalous.len() > MAX_LISTED_ANOMALIES {
            let _ = writeln!(out, "  ... {} more not shown", anomalous.len() - MAX_LISTED_ANOMALIES);
        }
    }
}

fn write_image_stats(out: &mut String, stats: &ImageStats) {
    let _ = writeln!(out, "\n== image draws ({}) ==", stats.draws);
    let _ = writeln!(out, "formats: {}", counts_line(stats.by_format.iter().map(|(k, n)| (k, *n))));
    let _ = writeln!(out, "blend modes: {}", counts_line(stats.by_blend.iter().map(|(k, n)| (k, *n))));
    let _ = writeln!(out, "source data: {}", size_label(stats.total_bytes));
    if stats.repeated_sources > 0 {
        let _ = writeln!(out, "repeated: {} images drawn more than once", stats.repeated_sources);
    }
}

fn write_context(out: &mut String, report: &Report) {
    if let Some(buffer) = &report.buffer {
        let _ = writeln!(
            out,
            "{}: address 0x{:08X}, {} bytes{}",
            buffer.kind,
            buffer.address,
            buffer.size,
            buffer
                .physical
                .map(|p| format!(", physical 0x{:08X}", p))
                .unwrap_or_default()
        );
    }
    if let Some(target) = &report.render_target {
        let _ = writeln!(
            out,
            "render target: {}x{} stride {} {} at 0x{:08X}",
            target.width, target.height, target.stride, target.format_name, target.address
        );
    }
    if report.buffer.is_some() || report.render_target.is_some() {
        out.push('\n');
    }
}

fn write_registers(out: &mut String, report: &Report) {
    if report.registers.is_empty() {
        return;
    }
    let _ = writeln!(out, "== GPU registers ==");
    for note in &report.registers {
        let _ = writeln!(out, "{}", note);
    }
    out.push('\n');
}

fn write_integrity(out: &mut String, report: &Report) {
    let Some(integrity) = &report.integrity else {
        return;
    };
    let _ = writeln!(out, "\n== log integrity ==");
    if integrity.summary.is_clean() {
        let _ = writeln!(out, "no corruption detected");
        return;
    }

    let _ = writeln!(out, "{} suspicious lines", integrity.summary.lines_with_findings);
    for (signature, count) in integrity.summary.ranked() {
        let _ = writeln!(out, "  {:<20} {:>5}  {}", signature.as_str(), count, signature.label());
    }
    for finding in &integrity.findings {
        let _ = writeln!(out, "  line {}: {}", finding.line_number, finding.description);
        let _ = writeln!(out, "    {}", finding.excerpt);
    }
}

/// Render the whole report.
pub fn render_text(report: &Report, options: &TextOptions) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} ({})\n",
        report.source,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    write_context(&mut out, report);
    write_registers(&mut out, report);
    for segment in &report.session.segments {
        write_segment(&mut out, report, segment, options);
    }

    if report.session.is_empty() {
        let _ = writeln!(out, "no command words found in {}", report.source);
    } else {
        write_summary(&mut out, report);
    }

    if options.show_images && !report.session.image_draws.is_empty() {
        write_image_stats(&mut out, &report.image_stats());
    }
    write_integrity(&mut out, report);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::CommandDecoder;

    const LOG: &str = "\
[ap] last submit command:
0x30010A00 0x00000100
0x30010A29 0x20000000
0x40000001 0x00000000
0x00100010 0x00100010
0x50000000 0x00000000
";

    fn report() -> Report {
        Report::new("log", CommandDecoder::default().decode_log(LOG))
    }

    #[test]
    fn test_render_instructions() {
        let text = render_text(&report(), &TextOptions::default());
        assert!(text.contains("== last submitted commands =="));
        assert!(text.contains(" 0000  30010A00 00000100  STATE     write VgControl"));
        assert!(text.contains("!0020  50000000 00000000  UNKNOWN"));
        assert!(text.contains("image: src 0x20000000"));
        assert!(!text.contains("blend: SRC_OVER"));
    }

    #[test]
    fn test_verbose_details() {
        let options = TextOptions {
            verbose: true,
            ..Default::default()
        };
        let text = render_text(&report(), &options);
        assert!(text.contains("- blend: SRC_OVER"));
    }

    #[test]
    fn test_summary_and_images() {
        let text = render_text(&report(), &TextOptions::default());
        assert!(text.contains("anomalous instructions (1):"));
        assert!(text.contains("== image draws (1) =="));
    }

    #[test]
    fn test_empty_report() {
        let text = render_text(&Report::new("empty.log", Default::default()), &TextOptions::default());
        assert!(text.contains("no command words found in empty.log"));
    }

    #[test]
    fn test_integrity_clean() {
        let report = report().with_integrity(Vec::new());
        assert!(render_text(&report, &TextOptions::default()).contains("no corruption detected"));
    }

    #[test]
    fn test_size_label() {
        assert_eq!(size_label(512), "512B");
        assert_eq!(size_label(4096), "4KB");
    }
}
