//! Conf module: decoder configuration model and loading.

pub mod model;
pub mod load;

pub use load::ConfigError;
pub use model::{BufferLayout, ContextLayout, DecoderConfig, Limits};
