//! Vector export of decoded paths as SVG or an HTML page.

pub mod dedup;
pub mod html;
pub mod svg;

use std::path::{Path, PathBuf};

use cmdbuf::decode::DecodeSession;
use tracing::info;

use crate::config::ExportConfig;
use crate::error::{ViewerError, ViewerResult};

pub use dedup::{collect_shapes, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Html,
}

impl ExportFormat {
    /// `.svg` exports plain SVG, anything else gets the HTML page.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => ExportFormat::Svg,
            _ => ExportFormat::Html,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub shapes: usize,
    pub draws: usize,
}

pub struct Exporter {
    width: u32,
    height: u32,
    background: String,
    merge_windows: bool,
}

impl Exporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            width: config.canvas_width,
            height: config.canvas_height,
            background: config.background.clone(),
            merge_windows: config.merge_windows,
        }
    }

    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
        self
    }

    pub fn canvas(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render(&self, title: &str, session: &DecodeSession, format: ExportFormat) -> (String, Vec<Shape>) {
        let shapes = collect_shapes(session, self.merge_windows);
        let document = match format {
            ExportFormat::Svg => svg::render_svg(&shapes, self.width, self.height, &self.background),
            ExportFormat::Html => html::render_html(title, &shapes, self.width, self.height, &self.background),
        };
        (document, shapes)
    }

    pub fn write(&self, title: &str, session: &DecodeSession, path: &Path) -> ViewerResult<ExportSummary> {
        let format = ExportFormat::from_path(path);
        let (document, shapes) = self.render(title, session, format);

        std::fs::write(path, document).map_err(|source| ViewerError::Export {
            path: path.to_path_buf(),
            source,
        })?;

        let summary = ExportSummary {
            path: path.to_path_buf(),
            format,
            shapes: shapes.len(),
            draws: shapes.iter().map(|s| s.count).sum(),
        };
        info!(
            "Exported {} shapes ({} draws) to {} as {:?}",
            summary.shapes,
            summary.draws,
            summary.path.display(),
            summary.format
        );
        Ok(summary)
    }
}
