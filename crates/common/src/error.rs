//! Error types shared across framestitch crates.

use std::fmt;
use std::path::PathBuf;

/// Outcome of an external encoder process that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// Exit code, `None` when the process could not be spawned or was killed.
    pub status: Option<i32>,

    /// Trimmed stderr (or the spawn/wait error message).
    pub detail: String,
}

impl ProcessFailure {
    pub fn exited(status: Option<i32>, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into().trim().to_string(),
        }
    }

    pub fn spawn(detail: impl Into<String>) -> Self {
        Self::exited(None, detail)
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "exit code {code}")?,
            None => write!(f, "no exit code")?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Top-level error type for a stitch run.
///
/// Every variant is fatal to the run. The first one raised is the one the
/// caller sees; cleanup problems are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("Image input not found or not a directory: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Failed to list frames in {path}: {source}")]
    FrameListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create staging root {path}: {source}")]
    StagingInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Staging failed for batch {batch}: {message}")]
    Staging { batch: usize, message: String },

    #[error("Encoding failed for batch {batch} ({failure})")]
    Encoding {
        batch: usize,
        failure: ProcessFailure,
    },

    #[error("No segments to concatenate (expected {expected}, found {found})")]
    NoSegments { expected: usize, found: usize },

    #[error("Concat manifest {path} could not be built: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Concatenation failed ({failure})")]
    Concatenation { failure: ProcessFailure },

    #[error("Audio source not found or not a regular file: {path}")]
    AudioSourceNotFound { path: PathBuf },

    #[error("Muxing failed ({failure})")]
    Muxing { failure: ProcessFailure },

    #[error("Failed to move the muxed video to {path}: {source}")]
    Promotion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run cancelled during {stage}")]
    Cancelled { stage: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StitchError.
pub type StitchResult<T> = Result<T, StitchError>;

impl StitchError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: msg.into(),
        }
    }

    pub fn staging(batch: usize, msg: impl Into<String>) -> Self {
        Self::Staging {
            batch,
            message: msg.into(),
        }
    }

    /// Name of the pipeline stage that raised this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InputNotFound { .. } | Self::InvalidConfiguration { .. } => "validate",
            Self::AudioSourceNotFound { .. } => "validate",
            Self::FrameListing { .. } => "enumerate",
            Self::StagingInit { .. } => "staging-init",
            Self::Staging { .. } | Self::Encoding { .. } => "encode",
            Self::NoSegments { .. } | Self::Manifest { .. } | Self::Concatenation { .. } => {
                "concat"
            }
            Self::Muxing { .. } | Self::Promotion { .. } => "mux",
            Self::Cancelled { stage } => *stage,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => "io",
        }
    }

    /// Batch index the error refers to, when it is batch-specific.
    pub fn batch(&self) -> Option<usize> {
        match self {
            Self::Staging { batch, .. } | Self::Encoding { batch, .. } => Some(*batch),
            _ => None,
        }
    }

    /// Exit code reported by the external process, when there was one.
    pub fn process_status(&self) -> Option<i32> {
        match self {
            Self::Encoding { failure, .. }
            | Self::Concatenation { failure }
            | Self::Muxing { failure } => failure.status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_names_batch_and_status() {
        let err = StitchError::Encoding {
            batch: 2,
            failure: ProcessFailure::exited(Some(1), "  bad input\n"),
        };
        assert_eq!(err.stage(), "encode");
        assert_eq!(err.batch(), Some(2));
        assert_eq!(err.process_status(), Some(1));
        assert_eq!(
            err.to_string(),
            "Encoding failed for batch 2 (exit code 1: bad input)"
        );
    }

    #[test]
    fn test_process_failure_without_detail() {
        let failure = ProcessFailure::exited(None, "");
        assert_eq!(failure.to_string(), "no exit code");
    }

    #[test]
    fn test_non_batch_errors_have_no_batch() {
        let err = StitchError::NoSegments {
            expected: 0,
            found: 0,
        };
        assert_eq!(err.stage(), "concat");
        assert_eq!(err.batch(), None);
        assert_eq!(err.process_status(), None);
    }

    #[test]
    fn test_filesystem_errors_keep_their_stage() {
        let io = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let listing = StitchError::FrameListing {
            path: PathBuf::from("/frames"),
            source: io(),
        };
        let manifest = StitchError::Manifest {
            path: PathBuf::from("/stage/inputs.txt"),
            source: io(),
        };
        let promotion = StitchError::Promotion {
            path: PathBuf::from("/out/final.mp4"),
            source: io(),
        };
        assert_eq!(listing.stage(), "enumerate");
        assert_eq!(manifest.stage(), "concat");
        assert_eq!(promotion.stage(), "mux");
        assert_eq!(
            promotion.to_string(),
            "Failed to move the muxed video to /out/final.mp4: denied"
        );
    }
}
