//! Workers: isolated script contexts running on their own threads and
//! talking to their owner only through cloned messages.
//!
//! The owner side keeps a [`registry::WorkerRegistry`]; each worker thread
//! runs [`runtime::spawn`]. Their shared view of a worker is its
//! [`WorkerShared`] lifecycle state and cancellation flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use uuid::Uuid;

pub mod events;
pub mod message;
pub mod registry;
pub mod runtime;

/// Identifies a worker across threads and in bridged values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        WorkerId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_simple())
    }
}

/// `Created -> Running -> {Finished, Terminated, Crashed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    /// The script completed and the worker had nothing left to wait for.
    Finished,
    /// Stopped by `terminate()` (from either side) or by `close()`.
    Terminated,
    /// An uncaught error ended the worker.
    Crashed,
}

impl WorkerState {
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerState::Created | WorkerState::Running)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Finished => "finished",
            WorkerState::Terminated => "terminated",
            WorkerState::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// Lifecycle state shared by a worker thread and its owner.
#[derive(Debug)]
pub struct WorkerShared {
    pub id: WorkerId,
    state: Mutex<WorkerState>,
    cancel: Arc<AtomicBool>,
}

impl WorkerShared {
    pub fn new(id: WorkerId) -> Self {
        WorkerShared {
            id,
            state: Mutex::new(WorkerState::Created),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// The flag the worker's evaluator polls at every loop iteration and call.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Move a live worker to `Running`.
    pub fn mark_running(&self) {
        let mut state = self.state.lock();
        if *state == WorkerState::Created {
            *state = WorkerState::Running;
            debug!("worker {} running", self.id);
        }
    }

    /// Request termination. Takes effect immediately for the owner's view;
    /// the thread notices at its next check.
    pub fn terminate(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.is_live() {
            *state = WorkerState::Terminated;
            debug!("worker {} terminated", self.id);
        }
    }

    /// Record how the worker thread ended. A termination already recorded wins.
    pub fn finish(&self, outcome: WorkerState) -> WorkerState {
        let mut state = self.state.lock();
        if state.is_live() {
            *state = outcome;
            debug!("worker {} {}", self.id, outcome);
        }
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_wins_over_later_outcome() {
        let shared = WorkerShared::new(WorkerId::new());
        shared.mark_running();
        assert_eq!(shared.state(), WorkerState::Running);
        shared.terminate();
        assert!(shared.is_cancelled());
        assert_eq!(shared.finish(WorkerState::Finished), WorkerState::Terminated);
    }

    #[test]
    fn test_finish_records_outcome_once() {
        let shared = WorkerShared::new(WorkerId::new());
        assert_eq!(shared.finish(WorkerState::Crashed), WorkerState::Crashed);
        assert_eq!(shared.finish(WorkerState::Finished), WorkerState::Crashed);
        assert!(!shared.state().is_live());
    }
}
