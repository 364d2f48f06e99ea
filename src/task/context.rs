use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::InspectionConfig;
use crate::error::InspectionError;
use crate::history::HistoryBuilder;

use super::progress::ProgressHandle;
use super::{TaskReference, TaskReferenceId};

pub(super) type SlotValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone)]
pub(super) struct PropagatedFailure {
    pub(super) implementation_id: String,
    pub(super) message: String,
}

#[derive(Debug)]
struct SimpleError(String);

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SimpleError {}

impl From<PropagatedFailure> for InspectionError {
    fn from(failure: PropagatedFailure) -> Self {
        InspectionError::TaskRuntimeFailure {
            implementation_id: failure.implementation_id,
            source: Box::new(SimpleError(failure.message)),
        }
    }
}

pub(super) type SlotState = Option<Result<SlotValue, PropagatedFailure>>;

pub(super) struct Slot {
    tx: watch::Sender<SlotState>,
}

impl Slot {
    pub(super) fn new() -> (Self, watch::Receiver<SlotState>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub(super) fn publish(&self, value: Result<SlotValue, PropagatedFailure>) {
        // Last writer wins; every reference in a resolved graph has exactly
        // one producer, so this only ever runs once per slot.
        let _ = self.tx.send(Some(value));
    }
}

/// The shared registry every spawned task's [`TaskContext`] reads and writes
/// through (spec §4.2 "typed result map").
pub(super) struct RunResults {
    pub(super) slots: std::collections::HashMap<TaskReferenceId, watch::Receiver<SlotState>>,
    pub(super) cancelled: AtomicBool,
}

impl RunResults {
    pub(super) async fn wait_for(&self, id: &TaskReferenceId) -> Result<SlotValue, InspectionError> {
        let mut rx = self
            .slots
            .get(id)
            .expect("reference missing from resolved task graph: programming error")
            .clone();
        loop {
            if let Some(result) = rx.borrow().clone() {
                return result.map_err(InspectionError::from);
            }
            if rx.changed().await.is_err() {
                // Sender dropped without publishing: its task panicked.
                return Err(InspectionError::TaskRuntimeFailure {
                    implementation_id: id.to_string(),
                    source: Box::new(SimpleError(
                        "producing task terminated without a result".to_string(),
                    )),
                });
            }
        }
    }
}

/// Passed by value into each task's `execute` closure (spec §4.2): provides
/// dependency injection ([`TaskContext::get`]), shared sinks
/// ([`TaskContext::history_builder`]), and cooperative cancellation
/// ([`TaskContext::is_cancelled`]).
#[derive(Clone)]
pub struct TaskContext {
    pub(super) results: Arc<RunResults>,
    pub history_builder: Arc<HistoryBuilder>,
    pub progress: ProgressHandle,
    pub config: Arc<InspectionConfig>,
    pub dry_run: bool,
    pub(super) implementation_id: Arc<str>,
}

impl TaskContext {
    /// Await and downcast a dependency's result. Panics if `reference` was
    /// never part of the resolved graph — spec §4.2 calls this "a
    /// programming error (fatal)", distinct from a task's own runtime
    /// failure which is propagated as an `Err`.
    pub async fn get<T>(&self, reference: &TaskReference<T>) -> Result<Arc<T>, InspectionError>
    where
        T: Send + Sync + 'static,
    {
        let value = self.results.wait_for(&reference.id).await?;
        value
            .downcast::<T>()
            .map_err(|_| unreachable!("task reference type mismatch: programming error"))
    }

    pub fn is_cancelled(&self) -> bool {
        self.results.cancelled.load(Ordering::Acquire)
    }

    pub(super) fn cancel(&self) {
        self.results.cancelled.store(true, Ordering::Release);
    }
}
