//! Stage-tagged error taxonomy for the install pipeline.
//!
//! Every variant is terminal for the current install attempt. Nothing here is
//! retried; the caller re-runs the whole pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    /// No artifact source exists for the requested platform/strategy pair
    #[error("{0}")]
    Resolution(String),

    /// Download or build failed
    #[error("{0}")]
    Acquisition(String),

    /// Computed digest differs from the declared one
    #[error("checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    Integrity {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Writing under the prefix failed (lock, keg, binary, link or receipt)
    #[error("cannot write {}: {source}", path.display())]
    Placement {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Data or log directory could not be created
    #[error("cannot create {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Installed binary failed its smoke test
    #[error("`{check}` did not produce {expected:?}; output was: {output}")]
    Acceptance {
        check: String,
        expected: String,
        output: String,
    },

    /// The formula table is malformed
    #[error("invalid formula: {0}")]
    Formula(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// Short tag naming the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            InstallError::Resolution(_) => "resolve",
            InstallError::Acquisition(_) | InstallError::Http(_) => "acquire",
            InstallError::Integrity { .. } => "verify",
            InstallError::Placement { .. } => "place",
            InstallError::Directory { .. } => "prepare",
            InstallError::Acceptance { .. } => "accept",
            InstallError::Formula(_) | InstallError::Json(_) => "formula",
            InstallError::Io(_) => "io",
        }
    }

    /// Whether files may already be on disk when this error surfaces
    pub fn leaves_files(&self) -> bool {
        matches!(
            self,
            InstallError::Directory { .. } | InstallError::Acceptance { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
