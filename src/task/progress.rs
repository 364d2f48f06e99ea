//! Progress reporting (spec §5, §9 design note): a periodic reader of a
//! monotonically increasing counter, not a push channel — avoids coupling
//! the runner to any particular UI.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A point-in-time read of the run's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[derive(Debug)]
struct Counters {
    completed: AtomicUsize,
    total: AtomicUsize,
}

/// Owned by the [`TaskRunner`](super::TaskRunner); cloned into every task's
/// [`TaskContext`](super::TaskContext) as a [`ProgressHandle`].
#[derive(Debug)]
pub struct ProgressReporter {
    counters: Arc<Counters>,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            counters: Arc::new(Counters {
                completed: AtomicUsize::new(0),
                total: AtomicUsize::new(total),
            }),
        }
    }

    pub fn handle(&self) -> ProgressHandle {
        ProgressHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.handle().snapshot()
    }
}

/// A cheap, cloneable read/increment handle for a single run's progress
/// counter.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    counters: Arc<Counters>,
}

impl ProgressHandle {
    pub fn mark_completed(&self) {
        self.counters.completed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.counters.completed.load(Ordering::Acquire),
            total: self.counters.total.load(Ordering::Acquire),
        }
    }
}
