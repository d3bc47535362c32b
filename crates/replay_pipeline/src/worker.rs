//! Worker loop: one engine session per batch of matches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use replay_core::engine::{CaptureConfig, EngineLauncher, SimulationEngine};
use replay_core::sampler::SampledFrames;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::layout::{replay_name, DatasetLayout};
use crate::progress::{MatchOutcome, Progress};
use crate::queue::{JobQueue, WorkerLease};
use crate::session::{ReplaySession, SessionRequest};

/// Everything a worker shares with the rest of the pool.
#[derive(Debug)]
pub struct WorkerContext {
    /// Output tree.
    pub layout: DatasetLayout,
    /// Directory custom map paths are resolved against.
    pub maps_dir: PathBuf,
    /// Capture options for every session.
    pub capture: CaptureConfig,
    /// Matches per engine session.
    pub batch_size: usize,
    /// Shared job queue.
    pub queue: Arc<JobQueue<PathBuf>>,
    /// Shared counters.
    pub progress: Arc<Progress>,
}

/// Pull matches until the queue is drained or interrupted.
///
/// The lease keeps the worker counted as live; it is released when this
/// returns.
pub fn run_worker<L: EngineLauncher>(
    id: usize,
    launcher: &L,
    ctx: &WorkerContext,
    lease: WorkerLease<PathBuf>,
) {
    let _lease = lease;
    let mut session = ReplaySession::new(ctx.capture, ctx.queue.cancel_token().clone());

    loop {
        if !ctx.queue.wait_for_item() {
            debug!(worker = id, "No work left, worker exiting");
            return;
        }
        let mut engine = match launcher.launch() {
            Ok(engine) => engine,
            Err(e) => {
                error!(worker = id, error = %e, "Failed to launch engine, worker exiting");
                return;
            }
        };
        debug!(worker = id, "Engine session opened");

        for _ in 0..ctx.batch_size.max(1) {
            let Some(job) = ctx.queue.get() else {
                debug!(worker = id, "Queue drained, worker exiting");
                return;
            };
            let index = ctx.progress.begin();
            info!(
                "Processing {}/{}: {}",
                index,
                ctx.progress.total(),
                job.display()
            );

            match process_match(&mut engine, &mut session, ctx, &job) {
                Ok(outcome) => ctx.progress.record(outcome),
                Err(e) if e.is_interrupt() => {
                    info!(worker = id, replay = %job.display(), "Interrupted");
                    return;
                }
                Err(e) if e.is_configuration() => {
                    warn!(replay = %job.display(), error = %e, "Skipping match");
                    ctx.progress.record(MatchOutcome::Skipped);
                }
                Err(e) => {
                    error!(replay = %job.display(), error = %e, "Match failed");
                    ctx.progress.record(MatchOutcome::Failed);
                    if e.is_engine_failure() {
                        debug!(worker = id, "Recycling engine session");
                        break;
                    }
                }
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| PipelineError::io(path, e))
}

/// Load a match's sampled-frame file.
pub fn load_sampled_frames(path: &Path) -> Result<SampledFrames> {
    if !path.is_file() {
        return Err(PipelineError::MissingPrerequisite {
            what: "sampled frames",
            path: path.to_path_buf(),
        });
    }
    let bytes = read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::json(path, e))
}

/// Replay every incomplete participant of one match.
pub fn process_match<E: SimulationEngine>(
    engine: &mut E,
    session: &mut ReplaySession,
    ctx: &WorkerContext,
    replay_path: &Path,
) -> Result<MatchOutcome> {
    let replay = replay_name(replay_path)?;
    let frames = load_sampled_frames(&ctx.layout.sampled_frames(&replay))?;

    let replay_data = read_file(replay_path)?;
    let info = engine.replay_info(&replay_data)?;
    let map_data = match info.local_map_path.as_deref() {
        Some(map) if !map.is_empty() => Some(read_file(&ctx.maps_dir.join(map))?),
        _ => None,
    };
    let players = info.player_pair()?;

    let mut sessions = 0;
    for participant in players {
        let outputs = ctx.layout.outputs(participant, &replay);
        if outputs.is_complete() {
            debug!(replay = %replay, player_id = participant.player_id, "Already extracted");
            continue;
        }
        let summary = session.run(
            engine,
            SessionRequest {
                replay_data: &replay_data,
                map_data: map_data.as_deref(),
                participant,
                frames: &frames,
                outputs: &outputs,
            },
        )?;
        debug!(
            replay = %replay,
            player_id = participant.player_id,
            records = summary.records,
            "Participant extracted"
        );
        sessions += 1;
    }

    Ok(if sessions == 0 {
        MatchOutcome::AlreadyComplete
    } else {
        MatchOutcome::Extracted { sessions }
    })
}
