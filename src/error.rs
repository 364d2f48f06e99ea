//! Typed error surface for the inspection engine (spec §7).
//!
//! The CLI shell (`main.rs`) wraps these in `anyhow::Context` for
//! human-readable reporting; library code always returns `InspectionError`
//! so callers can match on the kind.

use thiserror::Error;

use crate::task::TaskReferenceId;

/// A single candidate considered (and rejected) while resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableImplementation {
    pub implementation_id: String,
    pub reference: TaskReferenceId,
    pub selection_priority: i64,
}

/// All error kinds the engine can fail with (spec §7).
#[derive(Debug, Error)]
pub enum InspectionError {
    /// The `Dependency` resolver rule could not satisfy a reference from the
    /// available task pool.
    #[error(
        "unresolved dependency {reference}: no available implementation (considered: {})",
        .available.iter().map(|a| a.implementation_id.as_str()).collect::<Vec<_>>().join(", ")
    )]
    DependencyUnresolvable {
        reference: TaskReferenceId,
        available: Vec<AvailableImplementation>,
    },

    /// The graph resolver exceeded `GraphResolver.MaxIteration` without
    /// converging.
    #[error("task graph resolution did not converge after {max_iterations} rounds")]
    ResolutionNotConverged { max_iterations: usize },

    /// Two tasks in the input set declared the same implementation id.
    #[error("duplicate implementation id: {implementation_id}")]
    DuplicateImplementationId { implementation_id: String },

    /// A task's execute function returned a failure; the run is cancelled.
    #[error("task '{implementation_id}' failed: {source}")]
    TaskRuntimeFailure {
        implementation_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A log was missing a required field set at read time.
    #[error("malformed log: missing required field set '{field_set}'")]
    MalformedLog { field_set: &'static str },

    /// A strategic merge produced an invalid tree for a PATCH body. Recoverable:
    /// callers (the ManifestGenerator) catch this and reuse the prior manifest.
    #[error("merge failed for {resource_path}: {reason}")]
    MergeFailure {
        resource_path: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, InspectionError>;
