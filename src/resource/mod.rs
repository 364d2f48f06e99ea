//! Resource identity, operations, and the revision/event types that flow
//! through the history-reconstruction pipeline (spec §3).

mod change_event;
mod identity;
mod operation;
mod revision;

pub use change_event::{ResourceBody, ResourceChangeEvent, ResourceEventType};
pub use identity::{
    csm_access_path, owner_subresource_path, pod_phase_path, ResourceIdentity, ResourceIdentityKind,
};
pub use operation::{singularize_plural_kind, KubernetesObjectOperation, Verb};
pub use revision::{ConditionStatus, ContainerRevisionState, EndpointRevisionState,
    PodPhaseRevisionState, RevisionState, StagingResourceRevision};

pub const CLUSTER_SCOPE: &str = "cluster-scope";
