//! `TaskRunner` (spec §4.2): executes a resolved task graph.
//!
//! Every resolved task is spawned immediately as its own tokio task; a task
//! that needs another's output blocks inside its own body on
//! [`TaskContext::get`], which awaits that reference's
//! [`watch`](tokio::sync::watch) slot. There is no separate scheduling pass
//! that waits for dependencies before spawning — the dataflow falls out of
//! each task awaiting what it needs, the same way the engine's source/target
//! stream walk (see `crate::modifiers::framework`) is an ordinary iterator
//! rather than a hand-rolled scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::InspectionConfig;
use crate::error::InspectionError;
use crate::history::HistoryBuilder;

use super::context::{PropagatedFailure, RunResults, Slot};
use super::resolver::ResolvedTask;
use super::{ProgressReporter, TaskContext, TaskReference, TaskReferenceId};

/// Query handle into a finished run's results, returned by
/// [`TaskRunner::run`]. Every reference that was part of the resolved graph
/// can be re-read here by its typed [`TaskReference`].
pub struct TaskResults {
    results: Arc<RunResults>,
}

impl TaskResults {
    pub async fn get<T>(&self, reference: &TaskReference<T>) -> Result<Arc<T>, InspectionError>
    where
        T: Send + Sync + 'static,
    {
        let value = self.results.wait_for(&reference.id).await?;
        value
            .downcast::<T>()
            .map_err(|_| unreachable!("task reference type mismatch: programming error"))
    }
}

pub struct TaskRunner {
    resolved: Vec<ResolvedTask>,
    config: Arc<InspectionConfig>,
    history_builder: Arc<HistoryBuilder>,
    dry_run: bool,
}

impl TaskRunner {
    pub fn new(
        resolved: Vec<ResolvedTask>,
        config: Arc<InspectionConfig>,
        history_builder: Arc<HistoryBuilder>,
        dry_run: bool,
    ) -> Self {
        Self {
            resolved,
            config,
            history_builder,
            dry_run,
        }
    }

    pub fn progress_total(&self) -> usize {
        self.resolved.len()
    }

    /// Run every resolved task to completion. Returns the first task failure
    /// encountered, if any, after every spawned task has finished (tasks
    /// unrelated to the failing one still run to completion; dependents of
    /// the failure short-circuit as soon as they observe it).
    pub async fn run(self) -> Result<TaskResults, InspectionError> {
        let reporter = ProgressReporter::new(self.resolved.len());

        let mut senders: HashMap<TaskReferenceId, Slot> = HashMap::new();
        let mut receivers = HashMap::new();
        for task in &self.resolved {
            let (slot, rx) = Slot::new();
            senders.insert(task.provides().clone(), slot);
            receivers.insert(task.provides().clone(), rx);
        }
        let results = Arc::new(RunResults {
            slots: receivers,
            cancelled: AtomicBool::new(false),
        });

        let mut join_set = tokio::task::JoinSet::new();
        for task in self.resolved {
            let provides = task.provides().clone();
            let sender = senders
                .remove(&provides)
                .expect("every resolved task has exactly one slot");
            let ctx = TaskContext {
                results: Arc::clone(&results),
                history_builder: Arc::clone(&self.history_builder),
                progress: reporter.handle(),
                config: Arc::clone(&self.config),
                dry_run: self.dry_run,
                implementation_id: Arc::from(task.implementation_id()),
            };
            let results_for_failure = Arc::clone(&results);
            let implementation_id = task.implementation_id().to_string();
            let progress = ctx.progress.clone();
            join_set.spawn(async move {
                let outcome = task.inner().run(ctx).await;
                match outcome {
                    Ok(value) => {
                        sender.publish(Ok(value));
                        progress.mark_completed();
                        Ok(())
                    }
                    Err(err) => {
                        results_for_failure.cancelled.store(true, Ordering::Release);
                        sender.publish(Err(PropagatedFailure {
                            implementation_id: implementation_id.clone(),
                            message: err.to_string(),
                        }));
                        progress.mark_completed();
                        Err(err)
                    }
                }
            });
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(InspectionError::TaskRuntimeFailure {
                            implementation_id: "<unknown>".to_string(),
                            source: Box::new(join_err),
                        });
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(TaskResults { results }),
        }
    }
}
