//! Pipeline configuration.
//!
//! Loaded from RON, overridden by command-line flags:
//!
//! ```ron
//! (
//!     dataset_dir: "dataset",
//!     infos_dir: "replay_infos",
//!     maps_dir: "maps",
//!     abilities: "data/abilities.ron",
//!     engine: (program: "sc2-bridge", args: []),
//!     workers: 16,
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use replay_core::engine::CaptureConfig;
use replay_core::sampler::{SamplingConfig, DEFAULT_SKIP, DEFAULT_STEP_MUL};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Engine executable spoken to over JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCommand {
    /// Program to spawn.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for EngineCommand {
    fn default() -> Self {
        Self {
            program: "sc2-bridge".to_string(),
            args: Vec::new(),
        }
    }
}

/// Configuration for the sampling and extraction stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the dataset tree (`Actions/`, `SampledFrames/`, ...).
    pub dataset_dir: PathBuf,
    /// Directory of per-replay info files read by the sampling stage.
    pub infos_dir: PathBuf,
    /// Directory custom map paths are resolved against.
    pub maps_dir: PathBuf,
    /// RON table mapping ability ids to function names.
    pub abilities: PathBuf,
    /// Engine executable.
    pub engine: EngineCommand,
    /// Worker threads (one engine session each).
    pub workers: usize,
    /// Matches processed per engine session before it is recycled.
    pub batch_size: usize,
    /// Screen and minimap resolution in pixels.
    pub map_size: u32,
    /// Camera width in world units.
    pub camera_width: f32,
    /// Game loops per recorded action step.
    pub step_mul: u32,
    /// Periodic capture interval in game loops.
    pub skip: u32,
    /// Delay between worker starts, in milliseconds.
    pub stagger_ms: u64,
    /// How long an interrupted run waits for workers to clean up, in
    /// milliseconds.
    pub interrupt_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            infos_dir: PathBuf::from("replay_infos"),
            maps_dir: PathBuf::from("maps"),
            abilities: PathBuf::from("data/abilities.ron"),
            engine: EngineCommand::default(),
            workers: 16,
            batch_size: 10,
            map_size: 64,
            camera_width: 24.0,
            step_mul: DEFAULT_STEP_MUL,
            skip: DEFAULT_SKIP,
            stagger_ms: 1000,
            interrupt_grace_ms: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Load from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingPrerequisite {
                what: "config file",
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }

    /// Set dataset root
    pub fn with_dataset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dataset_dir = dir.into();
        self
    }

    /// Set replay-info directory
    pub fn with_infos_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.infos_dir = dir.into();
        self
    }

    /// Set custom map directory
    pub fn with_maps_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.maps_dir = dir.into();
        self
    }

    /// Set ability table path
    pub fn with_abilities(mut self, path: impl Into<PathBuf>) -> Self {
        self.abilities = path.into();
        self
    }

    /// Set engine executable
    pub fn with_engine(mut self, program: &str, args: Vec<String>) -> Self {
        self.engine = EngineCommand {
            program: program.to_string(),
            args,
        };
        self
    }

    /// Set worker count (at least 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set matches per engine session (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set capture resolution
    pub fn with_map_size(mut self, map_size: u32) -> Self {
        self.map_size = map_size;
        self
    }

    /// Set worker start delay
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger_ms = stagger.as_millis() as u64;
        self
    }

    /// Set how long an interrupted run waits for workers
    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set sampling parameters
    pub fn with_sampling(mut self, step_mul: u32, skip: u32) -> Self {
        self.step_mul = step_mul;
        self.skip = skip;
        self
    }

    /// Capture options passed to every replay start.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig::spatial(self.map_size, self.camera_width)
    }

    /// Frame sampler parameters.
    pub fn sampling_config(&self) -> SamplingConfig {
        SamplingConfig {
            step_mul: self.step_mul,
            skip: self.skip,
        }
    }

    /// Delay between worker starts.
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    /// Wait for in-flight workers after an interrupt.
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }

    /// Bound of the shared job queue.
    pub fn queue_capacity(&self) -> usize {
        self.workers.max(1) * 10
    }
}
