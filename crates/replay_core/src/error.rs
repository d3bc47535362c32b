//! Error types for the replay dataset core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for engine interaction, encoding and sampling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The simulation engine rejected a request or failed while serving it.
    #[error("Engine error: {0}")]
    Engine(String),

    /// A feature plane required by the layer table was not in the observation.
    #[error("Feature layer '{layer}' missing from observation")]
    MissingLayer {
        /// Full layer name (e.g. `screen unit_type`).
        layer: String,
    },

    /// A feature plane does not match the configured resolution.
    #[error("Feature layer '{layer}' is {actual_x}x{actual_y}, expected {expected_x}x{expected_y}")]
    LayerSizeMismatch {
        /// Full layer name.
        layer: String,
        /// Plane width reported by the engine.
        actual_x: u32,
        /// Plane height reported by the engine.
        actual_y: u32,
        /// Configured width.
        expected_x: u32,
        /// Configured height.
        expected_y: u32,
    },

    /// A feature plane uses a pixel depth the decoder does not understand.
    #[error("Feature layer '{layer}' has unsupported depth of {bits} bits per pixel")]
    UnsupportedPixelDepth {
        /// Full layer name.
        layer: String,
        /// Reported bits per pixel.
        bits: u32,
    },

    /// A feature plane's byte buffer is inconsistent with its size and depth.
    #[error("Feature layer '{layer}' carries {actual} bytes, expected {expected}")]
    LayerDataLength {
        /// Full layer name.
        layer: String,
        /// Bytes present.
        actual: usize,
        /// Bytes implied by size and depth.
        expected: usize,
    },

    /// A match does not have exactly two non-observer participants.
    #[error("Expected exactly 2 players, found {0}")]
    ParticipantCount(usize),

    /// A frame set is not strictly increasing.
    #[error("Frame {current} follows frame {previous}; sampled frames must be strictly increasing")]
    FrameOrder {
        /// The earlier frame.
        previous: u32,
        /// The offending frame.
        current: u32,
    },

    /// An ability table could not be parsed.
    #[error("Failed to parse ability table: {0}")]
    AbilityTable(#[from] ron::error::SpannedError),
}
