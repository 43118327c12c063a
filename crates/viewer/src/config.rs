use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};

/// Config file names tried in order, without extension.
const CONFIG_PATHS: [&str; 3] = ["/etc/cmdbuf/viewer", "config/viewer", "viewer"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewerConfig {
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Stdout is reserved for the report, so logs never go there.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stderr,
    File { path: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// CSS color of the canvas background.
    pub background: String,
    /// Collapse identical paths drawn in several tessellation windows.
    pub merge_windows: bool,
}

impl ViewerConfig {
    /// Load configuration from viewer.toml and environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Self::defaults()?;

        for path in CONFIG_PATHS {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Double underscore for nested keys: VIEWER__EXPORT__CANVAS_WIDTH
        builder = builder.add_source(
            config::Environment::with_prefix("VIEWER")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(builder)
    }

    /// Builder seeded with the compiled defaults, so keys missing from
    /// files and environment keep their default value.
    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = config::Config::try_from(&ViewerConfig::default())
            .context("Failed to serialize default configuration")?;
        Ok(config::Config::builder().add_source(defaults))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        if self.export.canvas_width == 0 || self.export.canvas_height == 0 {
            anyhow::bail!(
                "Canvas size must be non-zero (got {}x{})",
                self.export.canvas_width,
                self.export.canvas_height
            );
        }
        if self.export.background.trim().is_empty() {
            anyhow::bail!("Export background color is empty");
        }
        Ok(())
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "cmdbuf=info,cmdbuf_viewer=info".to_string(),
                format: LogFormat::Pretty,
                output: LogOutput::Stderr,
            },
            export: ExportConfig {
                canvas_width: 466,
                canvas_height: 466,
                background: "#000000".to_string(),
                merge_windows: true,
            },
        }
    }
}
