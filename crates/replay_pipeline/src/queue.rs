//! Bounded job queue with per-item acknowledgment.
//!
//! A filler thread [`put`](JobQueue::put)s matches, workers
//! [`get`](JobQueue::get) them, and the dispatcher [`join`](JobQueue::join)s
//! until every item has been acknowledged. Acknowledgment happens when the
//! [`JobHandle`] returned by `get` is dropped, so each dequeued item is
//! acknowledged exactly once whatever the worker does with it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{PipelineError, Result};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How [`JobQueue::join`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Closed and every item acknowledged.
    Completed,
    /// [`JobQueue::interrupt`] was called.
    Interrupted,
    /// Every worker exited before the queue was finished.
    Abandoned {
        /// Items put but never acknowledged.
        remaining: usize,
    },
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
    closed: bool,
    live_workers: usize,
    workers_issued: usize,
}

impl<T> QueueState<T> {
    fn finished(&self) -> bool {
        self.closed && self.unfinished == 0
    }

    fn abandoned(&self) -> bool {
        self.workers_issued > 0 && self.live_workers == 0 && !self.finished()
    }
}

/// Bounded, blocking, acknowledgment-tracked queue.
#[derive(Debug)]
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    changed: Condvar,
    capacity: usize,
    cancel: CancelToken,
}

impl<T> JobQueue<T> {
    /// Queue holding at most `capacity` unclaimed items.
    pub fn new(capacity: usize) -> Self {
        Self::with_cancel(capacity, CancelToken::new())
    }

    /// Queue sharing an existing cancellation token.
    pub fn with_cancel(capacity: usize, cancel: CancelToken) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.max(1)),
                unfinished: 0,
                closed: false,
                live_workers: 0,
                workers_issued: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            changed: Condvar::new(),
            capacity: capacity.max(1),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancellation token checked by everything waiting on this queue.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Maximum number of unclaimed items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue an item, blocking while the queue is full.
    pub fn put(&self, item: T) -> Result<()> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !self.cancel.is_cancelled() {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Interrupted);
        }
        state.items.push_back(item);
        state.unfinished += 1;
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue an item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained, or interrupted.
    pub fn get(&self) -> Option<JobHandle<'_, T>> {
        let mut state = self.lock();
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(JobHandle { queue: self, item });
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until an item is waiting to be claimed.
    ///
    /// Returns `false` once the queue is closed and drained, or interrupted.
    /// Another worker may claim the item first, so a following
    /// [`get`](Self::get) can still return `None`.
    pub fn wait_for_item(&self) -> bool {
        let mut state = self.lock();
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if !state.items.is_empty() {
                return true;
            }
            if state.closed {
                return false;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// No more items will be put.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.changed.notify_all();
    }

    /// Cancel and wake every waiter.
    pub fn interrupt(&self) {
        self.cancel.cancel();
        // Taking the lock orders the flag before any waiter re-checks it.
        drop(self.lock());
        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.changed.notify_all();
    }

    /// Closed and every item acknowledged.
    pub fn is_finished(&self) -> bool {
        self.lock().finished()
    }

    /// Items put but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Register a worker. The worker counts as live until the lease drops.
    pub fn worker_lease(self: &Arc<Self>) -> WorkerLease<T> {
        let mut state = self.lock();
        state.live_workers += 1;
        state.workers_issued += 1;
        WorkerLease {
            queue: Arc::clone(self),
        }
    }

    /// Block until the queue is finished, interrupted or abandoned.
    pub fn join(&self) -> JoinOutcome {
        let mut state = self.lock();
        loop {
            if self.cancel.is_cancelled() {
                return JoinOutcome::Interrupted;
            }
            if state.finished() {
                return JoinOutcome::Completed;
            }
            if state.abandoned() {
                return JoinOutcome::Abandoned {
                    remaining: state.unfinished,
                };
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn acknowledge(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        let finished = state.finished();
        drop(state);
        if finished {
            self.changed.notify_all();
        }
    }

    fn worker_exited(&self) {
        let mut state = self.lock();
        state.live_workers = state.live_workers.saturating_sub(1);
        drop(state);
        self.changed.notify_all();
    }
}

/// A dequeued item. Acknowledged when dropped.
#[derive(Debug)]
pub struct JobHandle<'a, T> {
    queue: &'a JobQueue<T>,
    item: T,
}

impl<T> std::ops::Deref for JobHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> Drop for JobHandle<'_, T> {
    fn drop(&mut self) {
        self.queue.acknowledge();
    }
}

/// Marks a worker as live for as long as it is held.
#[derive(Debug)]
pub struct WorkerLease<T> {
    queue: Arc<JobQueue<T>>,
}

impl<T> Drop for WorkerLease<T> {
    fn drop(&mut self) {
        self.queue.worker_exited();
    }
}
