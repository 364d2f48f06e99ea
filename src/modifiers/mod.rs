//! The `ManifestHistoryModifier` framework and the concrete walkers that
//! turn per-resource log streams into revisions, events, and aliases (spec
//! §4.7, §4.8).

pub mod container_state;
pub mod endpoint_slice;
pub mod framework;
pub mod log_summary;
pub mod namespace_request_event;
pub mod non_success_event;
pub mod owner_reference;
pub mod pod_phase;
pub mod resource_revision;
pub mod status_condition;

pub use container_state::ContainerStateModifier;
pub use endpoint_slice::EndpointSliceModifier;
pub use framework::{run_modifier, AnnotatedLog, ManifestHistoryModifier, ResourceGroup, ResourceGroups, ResourcePair};
pub use log_summary::LogSummaryModifier;
pub use namespace_request_event::NamespaceRequestEventModifier;
pub use non_success_event::NonSuccessEventModifier;
pub use owner_reference::OwnerReferenceModifier;
pub use pod_phase::PodPhaseModifier;
pub use resource_revision::ResourceRevisionModifier;
pub use status_condition::StatusConditionModifier;

use chrono::{DateTime, Utc};

/// Parse a Kubernetes-formatted RFC3339 timestamp field. Every modifier that
/// reads `creationTimestamp`/`deletionTimestamp`/`lastTransitionTime` goes
/// through this.
pub(crate) fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}

/// `apiVersion` without a group prefix belongs to the core group (spec §4.8
/// "Owner reference": "Normalizes apiVersion lacking a group prefix to
/// core/<v>").
pub(crate) fn normalize_api_version(raw: &str) -> String {
    if raw.contains('/') {
        raw.to_string()
    } else {
        format!("core/{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_api_version_adds_core_prefix() {
        assert_eq!(normalize_api_version("v1"), "core/v1");
        assert_eq!(normalize_api_version("apps/v1"), "apps/v1");
    }

    #[test]
    fn parse_rfc3339_roundtrips() {
        let parsed = parse_rfc3339("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
