//! Boundary to the simulation engine.
//!
//! The pipeline only sequences calls through these traits; how requests reach
//! the engine (in-process, subprocess, network) is up to the implementation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observation::{Observation, Size2D};
use crate::replay::ReplayInfo;

/// Spatial camera setup for feature-layer capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialCameraSetup {
    /// Camera width in world units.
    pub width: f32,
    /// Screen plane resolution.
    pub resolution: Size2D,
    /// Minimap plane resolution.
    pub minimap_resolution: Size2D,
}

/// What the engine should include in every observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Include raw unit state.
    pub raw: bool,
    /// Include the score breakdown.
    pub score: bool,
    /// Spatial feature layers, if requested.
    pub feature_layer: Option<SpatialCameraSetup>,
}

impl CaptureConfig {
    /// Raw state, score and square feature layers of `map_size` pixels.
    #[must_use]
    pub fn spatial(map_size: u32, camera_width: f32) -> Self {
        Self {
            raw: true,
            score: true,
            feature_layer: Some(SpatialCameraSetup {
                width: camera_width,
                resolution: Size2D::square(map_size),
                minimap_resolution: Size2D::square(map_size),
            }),
        }
    }

    /// Screen plane resolution (zero when feature layers are disabled).
    #[must_use]
    pub fn screen_size(&self) -> Size2D {
        self.feature_layer
            .map(|f| f.resolution)
            .unwrap_or_default()
    }

    /// Minimap plane resolution (zero when feature layers are disabled).
    #[must_use]
    pub fn minimap_size(&self) -> Size2D {
        self.feature_layer
            .map(|f| f.minimap_resolution)
            .unwrap_or_default()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::spatial(64, 24.0)
    }
}

/// Request to begin replaying a match from one participant's view.
#[derive(Debug, Clone, Copy)]
pub struct StartReplay<'a> {
    /// Binary replay contents.
    pub replay_data: &'a [u8],
    /// Custom map contents, when the replay was played on one.
    pub map_data: Option<&'a [u8]>,
    /// Capture options.
    pub options: &'a CaptureConfig,
    /// Whose point of view to observe from.
    pub observed_player_id: u32,
}

/// One live simulation session.
pub trait SimulationEngine {
    /// Inspect a replay without starting it.
    fn replay_info(&mut self, replay_data: &[u8]) -> Result<ReplayInfo>;

    /// Start replaying a match. Resets any previous replay.
    fn start_replay(&mut self, request: StartReplay<'_>) -> Result<()>;

    /// Advance the replay by `count` game loops.
    fn step(&mut self, count: u32) -> Result<()>;

    /// Capture the current observation.
    fn observe(&mut self) -> Result<Observation>;

    /// Textual dump of the running game's info.
    fn game_info(&mut self) -> Result<String>;

    /// Textual dump of the static game data.
    fn data_raw(&mut self) -> Result<String>;
}

/// Opens simulation sessions. Shared by all workers.
pub trait EngineLauncher: Send + Sync {
    /// Session type produced by this launcher.
    type Engine: SimulationEngine;

    /// Start a fresh session.
    fn launch(&self) -> Result<Self::Engine>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capture_config() {
        let config = CaptureConfig::default();
        assert!(config.raw);
        assert!(config.score);
        assert_eq!(config.screen_size(), Size2D::square(64));
        assert_eq!(config.minimap_size(), Size2D::square(64));
    }

    #[test]
    fn test_capture_config_without_layers() {
        let config = CaptureConfig {
            feature_layer: None,
            ..CaptureConfig::default()
        };
        assert_eq!(config.screen_size(), Size2D::default());
    }
}
