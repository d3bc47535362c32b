//! Progress tracking for extraction runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// How one dequeued match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// At least one participant was replayed and written.
    Extracted {
        /// Sessions run for this match.
        sessions: usize,
    },
    /// Every participant's output already existed.
    AlreadyComplete,
    /// A prerequisite file was missing or unreadable.
    Skipped,
    /// A session or structural check failed.
    Failed,
}

/// Shared counters, updated by every worker.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    started: AtomicUsize,
    extracted: AtomicUsize,
    sessions: AtomicUsize,
    already_complete: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    start_time: Instant,
}

impl Progress {
    /// Tracker for `total` matches.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: AtomicUsize::new(0),
            extracted: AtomicUsize::new(0),
            sessions: AtomicUsize::new(0),
            already_complete: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count a dequeued match; returns its 1-based position.
    pub fn begin(&self) -> usize {
        self.started.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record how a match ended.
    pub fn record(&self, outcome: MatchOutcome) {
        let counter = match outcome {
            MatchOutcome::Extracted { sessions } => {
                self.sessions.fetch_add(sessions, Ordering::Relaxed);
                &self.extracted
            }
            MatchOutcome::AlreadyComplete => &self.already_complete,
            MatchOutcome::Skipped => &self.skipped,
            MatchOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Total matches in the run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Matches dequeued so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> DispatchReport {
        DispatchReport {
            total: self.total,
            started: self.started(),
            extracted: self.extracted.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            already_complete: self.already_complete.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duration_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

/// Summary of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Matches in the list.
    pub total: usize,
    /// Matches dequeued.
    pub started: usize,
    /// Matches with at least one new output.
    pub extracted: usize,
    /// Replay sessions run.
    pub sessions: usize,
    /// Matches whose outputs all existed.
    pub already_complete: usize,
    /// Matches missing a prerequisite.
    pub skipped: usize,
    /// Matches that failed.
    pub failed: usize,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl DispatchReport {
    /// Matches that reached a final outcome.
    pub fn finished(&self) -> usize {
        self.extracted + self.already_complete + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let progress = Progress::new(5);
        assert_eq!(progress.begin(), 1);
        assert_eq!(progress.begin(), 2);
        assert_eq!(progress.begin(), 3);

        progress.record(MatchOutcome::Extracted { sessions: 2 });
        progress.record(MatchOutcome::AlreadyComplete);
        progress.record(MatchOutcome::Failed);

        let report = progress.report();
        assert_eq!(report.total, 5);
        assert_eq!(report.started, 3);
        assert_eq!(report.extracted, 1);
        assert_eq!(report.sessions, 2);
        assert_eq!(report.already_complete, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.finished(), 3);
    }

    #[test]
    fn test_begin_is_unique_across_threads() {
        let progress = std::sync::Arc::new(Progress::new(400));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let progress = std::sync::Arc::clone(&progress);
                std::thread::spawn(move || (0..100).map(|_| progress.begin()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=400).collect::<Vec<_>>());
    }
}
