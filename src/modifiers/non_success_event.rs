//! Non-success log event mapper (spec §4.8 "Non-success log event mapper"):
//! every error log gets an `Event` on its resource path, with a configured
//! set of subresources collapsed onto the parent.

use std::collections::BTreeSet;

use crate::history::{ChangeSet, Event, HistoryBuilder};
use crate::log::Severity;
use crate::resource::ResourceChangeEvent;

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};

#[derive(Debug, Clone, Default)]
pub struct NonSuccessEventModifier {
    subresources_to_parent: BTreeSet<String>,
}

impl NonSuccessEventModifier {
    pub fn new(subresources_to_parent: BTreeSet<String>) -> Self {
        Self {
            subresources_to_parent,
        }
    }
}

impl ManifestHistoryModifier for NonSuccessEventModifier {
    type State = ();

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        groups
            .values()
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
        if !audit.is_error {
            return state;
        }

        let path = match &target.subresource_name {
            Some(sub) if self.subresources_to_parent.contains(sub) => target.parent().path(),
            _ => target.path(),
        };

        let message = format!(
            "{} {} failed: {}",
            audit.operation.verb,
            audit.request_uri,
            audit.status_message.as_deref().unwrap_or("unknown error")
        );

        change_set.add_event(
            path,
            Event {
                time: event.timestamp(),
                message,
                severity: Severity::Error,
            },
        );

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryBuilder;
    use crate::log::{AuditFields, CommonFields, Log};
    use crate::node::StructuredNode;
    use crate::resource::{KubernetesObjectOperation, ResourceEventType, ResourceIdentity, Verb};
    use chrono::Utc;
    use std::sync::Arc;

    fn event_for(subresource: Option<&str>, is_error: bool) -> ResourceChangeEvent {
        let mut id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        if let Some(sub) = subresource {
            id = id.with_subresource(sub);
        }
        let log = Arc::new(
            Log::new(
                0,
                StructuredNode::null(),
                CommonFields {
                    timestamp: Utc::now(),
                    severity: if is_error { Severity::Error } else { Severity::Info },
                },
            )
            .with_audit(AuditFields {
                operation: KubernetesObjectOperation {
                    verb: Verb::Update,
                    api_version: "core/v1".into(),
                    plural_kind: "pods".into(),
                    namespace: "default".into(),
                    name: "nginx".into(),
                    subresource_name: subresource.map(String::from),
                },
                principal: "system:admin".into(),
                request_uri: "/api/v1/namespaces/default/pods/nginx/status".into(),
                status_code: Some(if is_error { 409 } else { 200 }),
                status_message: is_error.then(|| "Conflict".to_string()),
                is_error,
                request_body: None,
                response_body: None,
            }),
        );
        ResourceChangeEvent {
            event_type: ResourceEventType::TargetModification,
            log,
            source_resource: Some(id.clone()),
            target_resource: Some(id),
            source_body: None,
            target_body: None,
        }
    }

    #[test]
    fn status_subresource_error_collapses_to_parent() {
        let modifier = NonSuccessEventModifier::new(BTreeSet::from(["status".to_string()]));
        let mut change_set = ChangeSet::new(0);
        let history_builder = HistoryBuilder::new();
        modifier.process(0, &event_for(Some("status"), true), &mut change_set, &history_builder, ());
        let touched: Vec<_> = change_set.touched_paths().collect();
        assert_eq!(touched, vec!["core/v1#pod#default#nginx"]);
    }

    #[test]
    fn unconfigured_subresource_keeps_its_own_path() {
        let modifier = NonSuccessEventModifier::new(BTreeSet::from(["status".to_string()]));
        let mut change_set = ChangeSet::new(0);
        let history_builder = HistoryBuilder::new();
        modifier.process(0, &event_for(Some("exec"), true), &mut change_set, &history_builder, ());
        let touched: Vec<_> = change_set.touched_paths().collect();
        assert_eq!(touched, vec!["core/v1#pod#default#nginx#exec"]);
    }

    #[test]
    fn success_log_adds_no_event() {
        let modifier = NonSuccessEventModifier::default();
        let mut change_set = ChangeSet::new(0);
        let history_builder = HistoryBuilder::new();
        modifier.process(0, &event_for(None, false), &mut change_set, &history_builder, ());
        assert_eq!(change_set.touched_paths().count(), 0);
    }
}
