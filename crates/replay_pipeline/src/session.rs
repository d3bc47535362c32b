//! Replay session: one match replayed from one participant's point of view.
//!
//! ```text
//! Starting → Replaying → Finalizing → Closed
//!     └──────────┴────────────┴─────→ Failed
//! ```
//!
//! Outputs are owned by an [`OutputGuard`] from the moment the session
//! starts; any exit that does not reach `Closed` removes them.

use std::fmt;
use std::path::Path;

use replay_core::encoder::FeatureEncoder;
use replay_core::engine::{CaptureConfig, SimulationEngine, StartReplay};
use replay_core::replay::ParticipantInfo;
use replay_core::sampler::SampledFrames;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::layout::ParticipantOutputs;
use crate::output::{FrameRecord, GlobalInfo, OutputGuard, RecordWriter};
use crate::queue::CancelToken;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Replay requested, global info being captured.
    Starting,
    /// Stepping through sampled frames.
    Replaying,
    /// Flushing and closing the stream.
    Finalizing,
    /// Outputs written.
    Closed,
    /// Outputs removed.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Replaying => "replaying",
            Self::Finalizing => "finalizing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs of one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionRequest<'a> {
    /// Binary replay contents.
    pub replay_data: &'a [u8],
    /// Custom map contents.
    pub map_data: Option<&'a [u8]>,
    /// Participant to observe.
    pub participant: &'a ParticipantInfo,
    /// Frames to capture.
    pub frames: &'a SampledFrames,
    /// Where to write.
    pub outputs: &'a ParticipantOutputs,
}

/// Result of a closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Records written.
    pub records: usize,
    /// Game loops stepped.
    pub loops: u32,
}

/// Drives one engine through one (match, participant).
#[derive(Debug)]
pub struct ReplaySession {
    capture: CaptureConfig,
    encoder: FeatureEncoder,
    cancel: CancelToken,
    state: SessionState,
}

impl ReplaySession {
    /// Session capturing with `capture`, stopping early when `cancel` fires.
    pub fn new(capture: CaptureConfig, cancel: CancelToken) -> Self {
        Self {
            encoder: FeatureEncoder::new(&capture),
            capture,
            cancel,
            state: SessionState::Starting,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Replay, capture and write. On error every output of the
    /// (match, participant) is removed before returning.
    pub fn run<E: SimulationEngine>(
        &mut self,
        engine: &mut E,
        request: SessionRequest<'_>,
    ) -> Result<SessionSummary> {
        self.state = SessionState::Starting;
        let guard = OutputGuard::new(request.outputs.clone());

        match self.drive(engine, &request) {
            Ok(summary) => {
                guard.commit();
                self.state = SessionState::Closed;
                Ok(summary)
            }
            Err(e) => {
                drop(guard);
                debug!(state = %self.state, error = %e, "Session failed");
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn drive<E: SimulationEngine>(
        &mut self,
        engine: &mut E,
        request: &SessionRequest<'_>,
    ) -> Result<SessionSummary> {
        let outputs = request.outputs;
        create_parent(&outputs.observations)?;
        create_parent(&outputs.global_info)?;

        engine.start_replay(StartReplay {
            replay_data: request.replay_data,
            map_data: request.map_data,
            options: &self.capture,
            observed_player_id: request.participant.player_id,
        })?;
        GlobalInfo {
            game_info: engine.game_info()?,
            data_raw: engine.data_raw()?,
        }
        .save(&outputs.global_info)?;

        self.state = SessionState::Replaying;
        let mut writer = RecordWriter::create(&outputs.observations)?;
        let mut loops = 0u32;
        for (frame, delta) in request.frames.deltas() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Interrupted);
            }
            if delta > 0 {
                engine.step(delta)?;
                loops += delta;
            }
            let observation = engine.observe()?;
            let features = self.encoder.encode(&observation)?;
            writer.append(&FrameRecord {
                frame,
                game_loop: observation.game_loop,
                features,
            })?;
        }

        self.state = SessionState::Finalizing;
        let records = writer.records();
        writer.finish()?;
        debug!(
            player_id = request.participant.player_id,
            records, loops, "Session closed"
        );
        Ok(SessionSummary { records, loops })
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) => std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e)),
        None => Ok(()),
    }
}
