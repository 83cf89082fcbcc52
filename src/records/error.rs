//! Record source error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading record collections
#[derive(Error, Debug)]
pub enum SourceError {
    /// Collection file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Collection file is not valid JSON for its record type
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for record source operations
pub type SourceResult<T> = Result<T, SourceError>;
