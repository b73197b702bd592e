//! FIFO queue of job ids drained by a single worker.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Result of [`JobQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The id was appended. `start_worker` is set when no worker is running
    /// and the caller must start one.
    Queued { start_worker: bool },
    /// The id is already queued or active; nothing changed.
    Duplicate,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<String>,
    active: Option<String>,
    worker_running: bool,
}

/// Queue state shared between submitters and the worker.
///
/// The pending ids, the active id and the worker-running flag change together
/// under one lock.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless it is already queued or being worked on.
    pub fn push(&self, id: &str) -> PushOutcome {
        let mut state = self.state.lock();
        if state.active.as_deref() == Some(id) || state.pending.iter().any(|p| p == id) {
            return PushOutcome::Duplicate;
        }
        state.pending.push_back(id.to_string());

        let start_worker = !state.worker_running;
        state.worker_running = true;
        PushOutcome::Queued { start_worker }
    }

    /// Take the next id for the worker and mark it active.
    ///
    /// When the queue is empty the worker-running flag is cleared and the
    /// worker must exit.
    pub fn next(&self) -> Option<String> {
        let mut state = self.state.lock();
        state.active = state.pending.pop_front();
        if state.active.is_none() {
            state.worker_running = false;
        }
        state.active.clone()
    }

    /// Clear the active id once its run has concluded.
    pub fn finish(&self, id: &str) {
        let mut state = self.state.lock();
        if state.active.as_deref() == Some(id) {
            state.active = None;
        }
    }

    /// Number of ids waiting (excluding the active one).
    pub fn depth(&self) -> usize {
        self.state.lock().pending.len()
    }
}
