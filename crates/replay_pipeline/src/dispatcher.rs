//! Dispatcher: fills the job queue and runs the worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use replay_core::engine::EngineLauncher;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::layout::{DatasetLayout, MatchList};
use crate::progress::{DispatchReport, Progress};
use crate::queue::{JobQueue, JoinOutcome};
use crate::worker::{run_worker, WorkerContext};

/// Cancels a running dispatch from another thread (e.g. a signal handler).
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    queue: Arc<JobQueue<PathBuf>>,
}

impl InterruptHandle {
    /// Stop the run. Workers exit after their current frame, and the
    /// dispatcher returns once they have cleaned up or the grace period has
    /// passed.
    pub fn interrupt(&self) {
        self.queue.interrupt();
    }
}

/// Runs one extraction pass over a match list.
pub struct Dispatcher<L> {
    launcher: Arc<L>,
    config: PipelineConfig,
    queue: Arc<JobQueue<PathBuf>>,
}

impl<L> Dispatcher<L>
where
    L: EngineLauncher + 'static,
{
    /// Dispatcher opening engine sessions through `launcher`.
    pub fn new(launcher: L, config: PipelineConfig) -> Self {
        let queue = Arc::new(JobQueue::new(config.queue_capacity()));
        Self {
            launcher: Arc::new(launcher),
            config,
            queue,
        }
    }

    /// Handle that interrupts this dispatcher's run.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Process every match in `matches` and wait until each one is
    /// acknowledged.
    ///
    /// Returns [`PipelineError::Interrupted`] when the run is interrupted,
    /// after giving in-flight workers up to the configured grace period to
    /// remove partial outputs, and [`PipelineError::WorkersAbandoned`] if
    /// every worker exits early.
    pub fn run(self, matches: &MatchList) -> Result<DispatchReport> {
        let layout = DatasetLayout::new(&self.config.dataset_dir, &matches.matchup);
        layout.prepare_extraction()?;

        let progress = Arc::new(Progress::new(matches.len()));
        let ctx = Arc::new(WorkerContext {
            layout,
            maps_dir: self.config.maps_dir.clone(),
            capture: self.config.capture_config(),
            batch_size: self.config.batch_size,
            queue: Arc::clone(&self.queue),
            progress: Arc::clone(&progress),
        });

        info!(
            matchup = %matches.matchup,
            matches = matches.len(),
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            map_size = self.config.map_size,
            "Starting extraction"
        );

        let filler = {
            let queue = Arc::clone(&self.queue);
            let replays = matches.replays.clone();
            thread::Builder::new()
                .name("queue-filler".to_string())
                .spawn(move || {
                    for replay in replays {
                        if queue.put(replay).is_err() {
                            return;
                        }
                    }
                    queue.close();
                })
                .map_err(|e| PipelineError::io("queue-filler", e))?
        };

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers.max(1) {
            if self.queue.cancel_token().is_cancelled() {
                break;
            }
            if id > 0 {
                thread::sleep(self.config.stagger());
            }
            let lease = self.queue.worker_lease();
            let launcher = Arc::clone(&self.launcher);
            let ctx = Arc::clone(&ctx);
            match thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || run_worker(id, launcher.as_ref(), &ctx, lease))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => error!(worker = id, error = %e, "Failed to spawn worker"),
            }
        }

        match self.queue.join() {
            JoinOutcome::Completed => {}
            JoinOutcome::Interrupted => {
                warn!(
                    started = progress.started(),
                    total = progress.total(),
                    "Interrupted, abandoning remaining matches"
                );
                workers.push(filler);
                let stuck = drain(workers, self.config.interrupt_grace());
                if stuck > 0 {
                    warn!(threads = stuck, "Threads still running after interrupt grace period");
                }
                return Err(PipelineError::Interrupted);
            }
            JoinOutcome::Abandoned { remaining } => {
                self.queue.interrupt();
                return Err(PipelineError::WorkersAbandoned { remaining });
            }
        }

        for handle in workers {
            if handle.join().is_err() {
                error!("Worker panicked");
            }
        }
        if filler.join().is_err() {
            error!("Queue filler panicked");
        }

        let report = progress.report();
        info!(
            extracted = report.extracted,
            sessions = report.sessions,
            already_complete = report.already_complete,
            skipped = report.skipped,
            failed = report.failed,
            "Extraction complete in {:.1}s",
            report.duration_seconds
        );
        Ok(report)
    }
}

/// Join every thread that finishes within `grace`. Returns how many are
/// still running afterwards.
fn drain(mut threads: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    let start = Instant::now();
    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            threads.into_iter().partition(JoinHandle::is_finished);
        for handle in finished {
            if handle.join().is_err() {
                error!("Thread panicked during shutdown");
            }
        }
        threads = running;
        if threads.is_empty() || start.elapsed() >= grace {
            return threads.len();
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::replay::Race;
    use replay_test_utils::engine::{EngineScript, ScriptedLauncher};
    use replay_test_utils::fixtures;
    use std::time::Duration;

    fn config(root: &std::path::Path, workers: usize) -> PipelineConfig {
        PipelineConfig::default()
            .with_dataset_dir(root.join("ds"))
            .with_maps_dir(root.join("maps"))
            .with_workers(workers)
            .with_map_size(8)
            .with_stagger(Duration::ZERO)
    }

    fn match_list(root: &std::path::Path, count: usize) -> MatchList {
        let info = fixtures::two_player_info(Race::Terran, Race::Zerg);
        let layout = DatasetLayout::new(root.join("ds"), "Terran_vs_Zerg");
        layout.prepare_sampling().unwrap();
        let replays = (0..count)
            .map(|i| {
                let name = format!("{i:03}.SC2Replay");
                let path = root.join(&name);
                std::fs::write(&path, fixtures::replay_bytes(&info)).unwrap();
                std::fs::write(layout.sampled_frames(&name), "[8, 96]").unwrap();
                path
            })
            .collect();
        MatchList::new("Terran_vs_Zerg", replays)
    }

    #[test]
    fn test_every_match_processed_once() {
        let dir = tempfile::tempdir().unwrap();
        let matches = match_list(dir.path(), 12);
        let launcher = ScriptedLauncher::new();
        let stats = launcher.stats();

        let report = Dispatcher::new(launcher, config(dir.path(), 3))
            .run(&matches)
            .unwrap();

        assert_eq!(report.started, 12);
        assert_eq!(report.extracted, 12);
        assert_eq!(report.sessions, 24);
        assert_eq!(report.finished(), 12);
        assert_eq!(stats.starts(), 24);
    }

    #[test]
    fn test_empty_match_list() {
        let dir = tempfile::tempdir().unwrap();
        let report = Dispatcher::new(ScriptedLauncher::new(), config(dir.path(), 2))
            .run(&MatchList::new("Terran_vs_Zerg", Vec::new()))
            .unwrap();
        assert_eq!(report.started, 0);
    }

    #[test]
    fn test_all_workers_failing_to_launch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let matches = match_list(dir.path(), 3);
        let launcher = ScriptedLauncher::with_script(EngineScript {
            fail_launch: true,
            ..EngineScript::default()
        });

        let err = Dispatcher::new(launcher, config(dir.path(), 2))
            .run(&matches)
            .unwrap_err();
        assert!(matches!(err, PipelineError::WorkersAbandoned { .. }));
    }

    #[test]
    fn test_drain_gives_up_after_grace() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let quick = thread::spawn(|| {});
        let stuck = thread::spawn(move || {
            let _ = rx.recv();
        });

        assert_eq!(drain(vec![quick, stuck], Duration::from_millis(50)), 1);
        drop(tx);
    }

    #[test]
    fn test_drain_joins_threads_that_finish_in_time() {
        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(30)));
        assert_eq!(drain(vec![slow], Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_interrupt_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let matches = match_list(dir.path(), 3);
        let dispatcher = Dispatcher::new(ScriptedLauncher::new(), config(dir.path(), 2));
        dispatcher.interrupt_handle().interrupt();

        assert!(dispatcher.run(&matches).unwrap_err().is_interrupt());
    }
}
