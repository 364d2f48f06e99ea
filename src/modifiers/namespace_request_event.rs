//! Namespace-request event mapper (spec §4.8 "Namespace-request event
//! mapper"): logs whose target is a whole namespace (a DeleteCollection
//! without items, routed by the grouper to `ResourceIdentityKind::Namespace`)
//! get an `Event` on the namespace-level path instead of a revision.

use crate::history::{ChangeSet, Event, HistoryBuilder};
use crate::resource::{ResourceChangeEvent, ResourceIdentityKind};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};

#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceRequestEventModifier;

impl ManifestHistoryModifier for NamespaceRequestEventModifier {
    type State = ();

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        groups
            .values()
            .filter(|group| group.identity.kind() == ResourceIdentityKind::Namespace)
            .map(|group| ResourcePair {
                source: group.identity.clone(),
                target: group.identity.clone(),
            })
            .collect()
    }

    fn process(
        &self,
        _pass_index: usize,
        event: &ResourceChangeEvent,
        change_set: &mut ChangeSet,
        _history_builder: &HistoryBuilder,
        state: Self::State,
    ) -> Self::State {
        if event.event_type.is_source() {
            return state;
        }
        let Some(target) = event.target_resource.as_ref() else {
            return state;
        };
        let Some(audit) = event.log.audit() else {
            return state;
        };

        change_set.add_event(
            target.path(),
            Event {
                time: event.timestamp(),
                message: format!("{} {}", audit.operation.verb, audit.request_uri),
                severity: event.log.common().severity,
            },
        );

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryBuilder;
    use crate::log::{AuditFields, CommonFields, Log, Severity};
    use crate::node::StructuredNode;
    use crate::resource::{KubernetesObjectOperation, ResourceEventType, ResourceIdentity, Verb};
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn only_namespace_groups_are_paired() {
        let modifier = NamespaceRequestEventModifier;
        let mut groups = ResourceGroups::new();
        let ns_id = ResourceIdentity::namespace_level("core/v1", "default");
        groups.insert(
            ns_id.path(),
            crate::modifiers::ResourceGroup {
                identity: ns_id.clone(),
                logs: Vec::new(),
            },
        );
        let pod_id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        groups.insert(
            pod_id.path(),
            crate::modifiers::ResourceGroup {
                identity: pod_id,
                logs: Vec::new(),
            },
        );
        let pairs = modifier.resource_pairs(&groups);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].target.path(), ns_id.path());
    }

    #[test]
    fn target_step_adds_event_on_namespace_path() {
        let modifier = NamespaceRequestEventModifier;
        let ns_id = ResourceIdentity::namespace_level("core/v1", "default");
        let log = Arc::new(
            Log::new(
                0,
                StructuredNode::null(),
                CommonFields {
                    timestamp: Utc::now(),
                    severity: Severity::Info,
                },
            )
            .with_audit(AuditFields {
                operation: KubernetesObjectOperation {
                    verb: Verb::DeleteCollection,
                    api_version: "core/v1".into(),
                    plural_kind: "pods".into(),
                    namespace: "default".into(),
                    name: String::new(),
                    subresource_name: None,
                },
                principal: "system:admin".into(),
                request_uri: "/api/v1/namespaces/default/pods".into(),
                status_code: Some(200),
                status_message: None,
                is_error: false,
                request_body: None,
                response_body: None,
            }),
        );
        let event = ResourceChangeEvent {
            event_type: ResourceEventType::TargetModification,
            log,
            source_resource: Some(ns_id.clone()),
            target_resource: Some(ns_id.clone()),
            source_body: None,
            target_body: None,
        };
        let mut change_set = ChangeSet::new(0);
        let history_builder = HistoryBuilder::new();
        modifier.process(0, &event, &mut change_set, &history_builder, ());
        let touched: Vec<_> = change_set.touched_paths().collect();
        assert_eq!(touched, vec![ns_id.path()]);
    }
}
