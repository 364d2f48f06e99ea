//! Generic task graph: typed, dependency-resolved computations with
//! automatic resolution, progress reporting, and dependency injection
//! (spec §2, §4.1, §4.2).
//!
//! Follows the three REDESIGN FLAGS in spec §9:
//! - [`resolver::ResolvedTask`] is an immutable-by-decoration
//!   `Plain`/`Extended` tag, never a mutating wrapper.
//! - The typed result map is a registry of opaque `Arc<dyn Any>` handles
//!   with a checked downcast at the read site ([`TaskContext::get`]).
//! - Source/target stream merging (used by the modifier framework) is an
//!   ordinary iterator, not a coroutine — see `crate::modifiers::framework`.

mod context;
mod progress;
pub mod resolver;
mod runner;

pub use context::TaskContext;
pub use progress::{ProgressHandle, ProgressReporter, ProgressSnapshot};
pub use resolver::{ResolvedTask, TaskGraphResolver};
pub use runner::{TaskResults, TaskRunner};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::InspectionError;

/// A unique task or reference name (spec §3: "Unique by string").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskReferenceId(Arc<str>);

impl TaskReferenceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskReferenceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskReferenceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// `TaskReference<T>` (spec §3): a logical name plus a phantom type `T`
/// denoting the task's output. `T` is compile-time evidence only — the
/// runtime registry is untyped and recovers `T` via a checked downcast.
pub struct TaskReference<T> {
    pub id: TaskReferenceId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TaskReference<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskReferenceId::new(name),
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for TaskReference<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TaskReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskReference").field(&self.id).finish()
    }
}

/// Labels declared on a [`Task`] (spec §3): `required`,
/// `subsequent-task-refs`, and `selection-priority`.
#[derive(Debug, Clone, Default)]
pub struct TaskLabels {
    /// `RequiredLabel` resolver rule: always include this task.
    pub required: bool,
    /// `SubsequentTaskRefs` resolver rule: these references must end up
    /// depending (transitively) on this task.
    pub subsequent_task_refs: Vec<TaskReferenceId>,
    /// Tie-breaker when multiple available tasks provide the same
    /// reference; higher wins, ties go to the last one considered.
    pub selection_priority: i64,
}

impl TaskLabels {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.selection_priority = priority;
        self
    }

    pub fn with_subsequent_task_refs(mut self, refs: Vec<TaskReferenceId>) -> Self {
        self.subsequent_task_refs = refs;
        self
    }
}

/// Object-safe task handle used throughout the graph/runner (the erased
/// form of [`Task<T>`]).
#[async_trait::async_trait]
pub trait DynTask: Send + Sync {
    fn implementation_id(&self) -> &str;
    fn provides(&self) -> &TaskReferenceId;
    fn dependencies(&self) -> &[TaskReferenceId];
    fn labels(&self) -> &TaskLabels;
    async fn run(&self, ctx: TaskContext) -> Result<Arc<dyn std::any::Any + Send + Sync>, InspectionError>;
}

/// `Task<T>` (spec §3): a named, dependency-declaring computation producing
/// a `T`.
pub struct Task<T> {
    implementation_id: String,
    provides: TaskReferenceId,
    dependencies: Vec<TaskReferenceId>,
    labels: TaskLabels,
    #[allow(clippy::type_complexity)]
    execute: Arc<dyn Fn(TaskContext) -> BoxFuture<'static, Result<T, InspectionError>> + Send + Sync>,
}

impl<T> Task<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(
        implementation_id: impl Into<String>,
        provides: TaskReference<T>,
        execute: F,
    ) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, InspectionError>> + Send + 'static,
    {
        Self {
            implementation_id: implementation_id.into(),
            provides: provides.id,
            dependencies: Vec::new(),
            labels: TaskLabels::default(),
            execute: Arc::new(move |ctx| Box::pin(execute(ctx))),
        }
    }

    pub fn depends_on(mut self, reference: &TaskReferenceId) -> Self {
        self.dependencies.push(reference.clone());
        self
    }

    pub fn with_dependencies(mut self, refs: impl IntoIterator<Item = TaskReferenceId>) -> Self {
        self.dependencies.extend(refs);
        self
    }

    pub fn with_labels(mut self, labels: TaskLabels) -> Self {
        self.labels = labels;
        self
    }
}

#[async_trait::async_trait]
impl<T> DynTask for Task<T>
where
    T: Send + Sync + 'static,
{
    fn implementation_id(&self) -> &str {
        &self.implementation_id
    }

    fn provides(&self) -> &TaskReferenceId {
        &self.provides
    }

    fn dependencies(&self) -> &[TaskReferenceId] {
        &self.dependencies
    }

    fn labels(&self) -> &TaskLabels {
        &self.labels
    }

    async fn run(&self, ctx: TaskContext) -> Result<Arc<dyn std::any::Any + Send + Sync>, InspectionError> {
        let value = (self.execute)(ctx).await?;
        Ok(Arc::new(value) as Arc<dyn std::any::Any + Send + Sync>)
    }
}
