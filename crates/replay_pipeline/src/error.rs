//! Error types for the extraction pipeline.

use std::path::{Path, PathBuf};

use replay_core::error::CoreError;
use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while sampling, dispatching or running replay sessions.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filesystem failure on a known path.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON input file could not be parsed.
    #[error("Invalid JSON in '{}': {source}", path.display())]
    Json {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A RON configuration file could not be parsed.
    #[error("Invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// A file that must be produced by an earlier stage does not exist.
    #[error("Missing {what}: {}", path.display())]
    MissingPrerequisite {
        /// Kind of file (e.g. `sampled frames`).
        what: &'static str,
        /// Expected location.
        path: PathBuf,
    },

    /// A match-list path has no usable file name.
    #[error("Replay path has no file name: {}", .0.display())]
    InvalidReplayPath(PathBuf),

    /// Domain error from the engine, encoder or sampler.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An observation record could not be encoded or decoded.
    #[error("Record codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// The run was interrupted.
    #[error("Interrupted")]
    Interrupted,

    /// Every worker exited while matches were still queued.
    #[error("All workers exited with {remaining} matches unprocessed")]
    WorkersAbandoned {
        /// Matches never acknowledged.
        remaining: usize,
    },
}

impl PipelineError {
    /// Attach a path to an IO error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Attach a path to a JSON error.
    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error ends the run rather than one match.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Whether this error is a missing or unreadable prerequisite, which
    /// skips one match instead of failing it.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingPrerequisite { .. } | Self::Json { .. })
    }

    /// Whether this error means the engine session is in an unknown state
    /// and should be replaced.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::Core(CoreError::Engine(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(PipelineError::Interrupted.is_interrupt());
        assert!(PipelineError::MissingPrerequisite {
            what: "sampled frames",
            path: PathBuf::from("x"),
        }
        .is_configuration());
        assert!(PipelineError::from(CoreError::Engine("boom".into())).is_engine_failure());
        assert!(!PipelineError::from(CoreError::ParticipantCount(3)).is_engine_failure());
        assert!(!PipelineError::Interrupted.is_configuration());
    }

    #[test]
    fn test_io_error_names_path() {
        let err = PipelineError::io(
            "/data/replay.SC2Replay",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("/data/replay.SC2Replay"));
    }
}
