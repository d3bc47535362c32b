//! # Replay Core
//!
//! Domain logic for turning recorded matches into training tensors.
//!
//! This crate contains **only** pure logic:
//! - No file or process IO
//! - No threads
//! - No engine implementation (only the trait boundary)
//!
//! ## Crate Structure
//!
//! - [`replay`] - Match and participant metadata
//! - [`observation`] - Engine observation model and plane decoding
//! - [`features`] - Static feature-layer table
//! - [`encoder`] - Observation → fixed-shape tensors
//! - [`sampler`] - Action log → frames worth capturing
//! - [`engine`] - Simulation engine traits and capture options

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod encoder;
pub mod engine;
pub mod error;
pub mod features;
pub mod observation;
pub mod replay;
pub mod sampler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::encoder::{FeatureEncoder, FeatureTensors, ObservationSpec, Tensor};
    pub use crate::engine::{CaptureConfig, EngineLauncher, SimulationEngine, StartReplay};
    pub use crate::error::{CoreError, Result};
    pub use crate::features::{FeatureLayer, LayerSet, MINIMAP_LAYERS, SCREEN_LAYERS};
    pub use crate::observation::{ImageData, Observation, Size2D};
    pub use crate::replay::{ParticipantInfo, ParticipantKind, Race, ReplayInfo};
    pub use crate::sampler::{
        sample_frames, AbilityTable, ActionLog, ActionResolver, SampledFrames, SamplingConfig,
    };
}
