use chrono::{DateTime, Utc};

use super::operation::Verb;
use crate::node::StructuredNode;

/// `status ∈ {True, False, Unknown, NotGiven, NoAvailableInfo}` for a single
/// Kubernetes condition (spec §3, §4.8 "Status condition").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    /// The condition type was never observed on this resource.
    NotGiven,
    /// The condition type is known but no status could be determined
    /// (e.g. the manifest predates the log that would have told us).
    NoAvailableInfo,
}

impl ConditionStatus {
    /// Map a raw Kubernetes `status` string (`"True"`/`"False"`/`"Unknown"`)
    /// to a `ConditionStatus`; missing status yields `NoAvailableInfo`
    /// (spec §4.8).
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("True") => Self::True,
            Some("False") => Self::False,
            Some("Unknown") => Self::Unknown,
            Some(_) | None => Self::NoAvailableInfo,
        }
    }
}

/// Container state-machine states (spec §4.8 "Container state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRevisionState {
    Waiting,
    Started,
    RunningReady,
    RunningNonReady,
    TerminatedSuccess,
    TerminatedError,
    StatusNotAvailable,
}

/// Pod-phase state-machine states (spec §4.8 "Pod phase").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhaseRevisionState {
    Pending,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhaseRevisionState {
    pub fn from_raw_phase(raw: Option<&str>) -> Self {
        match raw {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Endpoint-slice per-endpoint states (spec §4.8 "Endpoint slice").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRevisionState {
    Ready,
    Unready,
    Terminating,
}

/// The full `RevisionState` enumeration (spec §3): a resource-level lifetime
/// tag plus the resource-specific sub-state-machines layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionState {
    /// The resource exists and is not being deleted.
    Existing,
    /// Deletion has started (finalizers/grace period pending).
    Deleting,
    /// The resource has been fully removed.
    Deleted,
    /// A synthesized revision not backed by any single log
    /// (e.g. inferred-creation, or a static-pod-condition placeholder).
    Inferred,
    Condition(ConditionStatus),
    Container(ContainerRevisionState),
    PodPhase(PodPhaseRevisionState),
    Endpoint(EndpointRevisionState),
}

/// `{verb, state, changeTime, requestor, body, partial}` (spec §3).
#[derive(Debug, Clone)]
pub struct StagingResourceRevision {
    pub verb: Verb,
    pub state: RevisionState,
    pub change_time: DateTime<Utc>,
    pub requestor: String,
    pub body: Option<StructuredNode>,
    /// True when `body` came from a PATCH request rather than a full
    /// response/prior-manifest merge (spec §4.5 step 1).
    pub partial: bool,
}

impl StagingResourceRevision {
    pub fn new(verb: Verb, state: RevisionState, change_time: DateTime<Utc>) -> Self {
        Self {
            verb,
            state,
            change_time,
            requestor: String::new(),
            body: None,
            partial: false,
        }
    }

    pub fn with_requestor(mut self, requestor: impl Into<String>) -> Self {
        self.requestor = requestor.into();
        self
    }

    pub fn with_body(mut self, body: StructuredNode) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }
}
