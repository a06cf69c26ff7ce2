//! Typed errors raised by tools.
//!
//! Every variant is recoverable from the loop's point of view: the rendered
//! message becomes the step's observation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("path '{0}' resolves outside the target root")]
    PathEscapesRoot(String),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("line range {start}-{end} is invalid for a file with {total} lines")]
    LineRange {
        start: usize,
        end: usize,
        total: usize,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host '{0}' is blocked by the HTTP probe policy")]
    HostBlocked(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding index unavailable: {0}")]
    Index(String),

    #[error("embedding request failed: {0}")]
    Embedding(String),
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
