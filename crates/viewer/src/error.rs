use std::path::PathBuf;

use cmdbuf::memory::ResolveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Failed to read input {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write export file {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Coredump resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
