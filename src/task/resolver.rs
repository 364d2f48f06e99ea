//! `TaskGraphResolver` (spec §4.1): turns a pool of available task
//! implementations into the closed set that must run, by repeatedly
//! applying three rules until the set stops changing:
//!
//! - `RequiredLabel` — tasks marked required always run.
//! - `Dependency` — a task's declared dependencies are satisfied by
//!   selecting, per reference, the available implementation with the
//!   highest `selection_priority`.
//! - `SubsequentTaskRefs` — a task can demand that whichever implementation
//!   ends up providing some other reference depend on it too.
//!
//! [`ResolvedTask`] implements the REDESIGN FLAG from spec §9: dependencies
//! injected by `SubsequentTaskRefs` are recorded as an `Extended` decoration
//! rather than by mutating the underlying `Arc<dyn DynTask>`.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{AvailableImplementation, InspectionError};

use super::{DynTask, TaskReferenceId};

/// A resolved graph member: the original task, plus any dependency edges
/// the `SubsequentTaskRefs` rule injected.
#[derive(Clone)]
pub enum ResolvedTask {
    Plain(Arc<dyn DynTask>),
    Extended(Arc<dyn DynTask>, Vec<TaskReferenceId>),
}

impl ResolvedTask {
    pub fn inner(&self) -> &Arc<dyn DynTask> {
        match self {
            Self::Plain(task) | Self::Extended(task, _) => task,
        }
    }

    pub fn implementation_id(&self) -> &str {
        self.inner().implementation_id()
    }

    pub fn provides(&self) -> &TaskReferenceId {
        self.inner().provides()
    }

    /// Declared dependencies plus any injected by `SubsequentTaskRefs`.
    pub fn dependencies(&self) -> Vec<TaskReferenceId> {
        match self {
            Self::Plain(task) => task.dependencies().to_vec(),
            Self::Extended(task, added) => {
                task.dependencies().iter().cloned().chain(added.iter().cloned()).collect()
            }
        }
    }

    fn has_dependency(&self, reference: &TaskReferenceId) -> bool {
        match self {
            Self::Plain(task) => task.dependencies().contains(reference),
            Self::Extended(task, added) => {
                task.dependencies().contains(reference) || added.contains(reference)
            }
        }
    }

    /// Add `reference` as a dependency if it isn't already one. Returns
    /// `true` if this changed the task (used to detect resolver fixpoint).
    fn extend_with(&mut self, reference: TaskReferenceId) -> bool {
        if self.has_dependency(&reference) {
            return false;
        }
        let task = Arc::clone(self.inner());
        let mut added = match self {
            Self::Extended(_, added) => std::mem::take(added),
            Self::Plain(_) => Vec::new(),
        };
        added.push(reference);
        *self = Self::Extended(task, added);
        true
    }
}

/// Resolves an available task pool into the closed set of tasks that must
/// run for the requested references to be satisfiable.
pub struct TaskGraphResolver {
    max_iterations: usize,
}

impl TaskGraphResolver {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    pub fn resolve(&self, pool: Vec<Arc<dyn DynTask>>) -> Result<Vec<ResolvedTask>, InspectionError> {
        let mut seen_ids = HashSet::new();
        for task in &pool {
            if !seen_ids.insert(task.implementation_id().to_string()) {
                return Err(InspectionError::DuplicateImplementationId {
                    implementation_id: task.implementation_id().to_string(),
                });
            }
        }

        let mut closure: IndexMap<String, ResolvedTask> = IndexMap::new();
        for task in &pool {
            if task.labels().required {
                closure.insert(task.implementation_id().to_string(), ResolvedTask::Plain(Arc::clone(task)));
            }
        }

        for _round in 0..self.max_iterations {
            let mut changed = false;

            // Dependency: every reference a closure member needs must have
            // a provider in the closure.
            let needed: Vec<TaskReferenceId> = closure
                .values()
                .flat_map(|t| t.dependencies())
                .filter(|reference| !closure.values().any(|t| t.provides() == reference))
                .collect();
            for reference in needed {
                if closure.values().any(|t| t.provides() == &reference) {
                    continue;
                }
                match self.select_provider(&pool, &reference) {
                    Some(chosen) => {
                        closure
                            .entry(chosen.implementation_id().to_string())
                            .or_insert_with(|| ResolvedTask::Plain(Arc::clone(chosen)));
                        changed = true;
                    }
                    None => {
                        return Err(InspectionError::DependencyUnresolvable {
                            reference: reference.clone(),
                            available: self.candidates(&pool, &reference),
                        });
                    }
                }
            }

            // SubsequentTaskRefs: whichever task provides `reference` must
            // depend (directly) on the declaring task. The provider is
            // pulled into the closure the same way `Dependency` does, since
            // a reference named here may not otherwise be needed by anyone.
            let demands: Vec<(TaskReferenceId, TaskReferenceId)> = closure
                .values()
                .map(|t| (t.provides().clone(), t.inner().labels().subsequent_task_refs.clone()))
                .flat_map(|(provider, refs)| refs.into_iter().map(move |r| (provider.clone(), r)))
                .collect();
            for (depender_provides, reference) in demands {
                if !closure.values().any(|t| t.provides() == &reference) {
                    match self.select_provider(&pool, &reference) {
                        Some(chosen) => {
                            closure
                                .entry(chosen.implementation_id().to_string())
                                .or_insert_with(|| ResolvedTask::Plain(Arc::clone(chosen)));
                            changed = true;
                        }
                        None => {
                            return Err(InspectionError::DependencyUnresolvable {
                                reference: reference.clone(),
                                available: self.candidates(&pool, &reference),
                            });
                        }
                    }
                }
                if let Some(provider) = closure.values_mut().find(|t| t.provides() == &reference) {
                    if provider.extend_with(depender_provides) {
                        changed = true;
                    }
                }
            }

            if !changed {
                return Ok(closure.into_values().collect());
            }
        }

        Err(InspectionError::ResolutionNotConverged {
            max_iterations: self.max_iterations,
        })
    }

    fn candidates(&self, pool: &[Arc<dyn DynTask>], reference: &TaskReferenceId) -> Vec<AvailableImplementation> {
        pool.iter()
            .filter(|t| t.provides() == reference)
            .map(|t| AvailableImplementation {
                implementation_id: t.implementation_id().to_string(),
                reference: reference.clone(),
                selection_priority: t.labels().selection_priority,
            })
            .collect()
    }

    /// Highest `selection_priority` wins; ties favor the implementation
    /// that appears later in `pool`.
    fn select_provider<'a>(
        &self,
        pool: &'a [Arc<dyn DynTask>],
        reference: &TaskReferenceId,
    ) -> Option<&'a Arc<dyn DynTask>> {
        pool.iter()
            .filter(|t| t.provides() == reference)
            .max_by_key(|t| t.labels().selection_priority)
    }
}
