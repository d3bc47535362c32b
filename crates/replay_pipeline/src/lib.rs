//! Replay-to-dataset extraction pipeline.
//!
//! Turns a list of recorded matches into training data in two stages:
//!
//! - **sample**: read each participant's action log and choose the frames
//!   worth capturing (no engine needed, runs in parallel with rayon)
//! - **extract**: replay every match from each player's point of view in a
//!   pool of engine sessions, encoding an observation at every sampled frame
//!
//! Re-running either stage skips work whose outputs already exist.
//!
//! # Protocol
//!
//! Engines run as child processes speaking JSON lines; see [`protocol`].
//! Anything implementing [`replay_core::engine::EngineLauncher`] can stand in
//! for them.
//!
//! # Example
//!
//! ```bash
//! # Choose frames for every Terran-vs-Zerg replay
//! cargo run -p replay_pipeline -- sample --match-list lists/Terran_vs_Zerg.json
//!
//! # Extract observations with 8 engine processes
//! cargo run -p replay_pipeline -- extract --match-list lists/Terran_vs_Zerg.json --workers 8
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod layout;
pub mod output;
pub mod process_engine;
pub mod progress;
pub mod protocol;
pub mod queue;
pub mod sampling;
pub mod session;
pub mod worker;

pub use config::{EngineCommand, PipelineConfig};
pub use dispatcher::{Dispatcher, InterruptHandle};
pub use error::{PipelineError, Result};
pub use layout::{DatasetLayout, MatchList, ParticipantOutputs};
pub use output::{read_records, FrameRecord, GlobalInfo, RecordReader, RecordWriter};
pub use process_engine::{EngineConnection, ProcessLauncher};
pub use progress::{DispatchReport, MatchOutcome};
pub use protocol::{Request, Response};
pub use queue::{CancelToken, JobQueue, JoinOutcome};
pub use sampling::{run_sampling, SamplingReport};
pub use session::{ReplaySession, SessionState};
