//! Log-summary mapper (spec §4.8 "Log-summary mapper"): a one-line
//! human-readable summary plus severity escalation, attached to the log's
//! sequence number rather than to any one resource path.

use crate::history::{ChangeSet, HistoryBuilder};
use crate::log::Severity;
use crate::resource::ResourceChangeEvent;

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSummaryModifier;

impl ManifestHistoryModifier for LogSummaryModifier {
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
        // Every merged-stream step carries the same source log regardless of
        // which side advanced; only summarize it once, on the target step,
        // so a pair doesn't double-write the same sequence number.
        if event.event_type.is_source() {
            return state;
        }

        let Some(audit) = event.log.audit() else {
            return state;
        };

        let summary = if audit.is_error {
            format!(
                "【{}({})】{} {}",
                audit.status_message.as_deref().unwrap_or(""),
                audit.status_code.map(|c| c.to_string()).unwrap_or_default(),
                audit.operation.verb,
                audit.request_uri
            )
        } else {
            format!("{} {}", audit.operation.verb, audit.request_uri)
        };

        change_set.set_log_summary(summary);
        if audit.is_error {
            change_set.set_severity(Severity::Error);
        }

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

    fn event(is_error: bool, status_message: Option<&str>, status_code: Option<u32>) -> ResourceChangeEvent {
        let id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        let log = Arc::new(
            Log::new(
                7,
                StructuredNode::null(),
                CommonFields {
                    timestamp: Utc::now(),
                    severity: Severity::Info,
                },
            )
            .with_audit(AuditFields {
                operation: KubernetesObjectOperation {
                    verb: Verb::Delete,
                    api_version: "core/v1".into(),
                    plural_kind: "pods".into(),
                    namespace: "default".into(),
                    name: "nginx".into(),
                    subresource_name: None,
                },
                principal: "system:admin".into(),
                request_uri: "/api/v1/namespaces/default/pods/nginx".into(),
                status_code,
                status_message: status_message.map(String::from),
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
    fn success_summary_has_no_bracketed_status() {
        let modifier = LogSummaryModifier;
        let mut change_set = ChangeSet::new(7);
        let history_builder = HistoryBuilder::new();
        modifier.process(0, &event(false, None, Some(200)), &mut change_set, &history_builder, ());
        assert_eq!(change_set.log_summary.as_deref(), Some("delete /api/v1/namespaces/default/pods/nginx"));
        assert!(change_set.severity_override.is_none());
    }

    #[test]
    fn error_summary_includes_status_and_escalates_severity() {
        let modifier = LogSummaryModifier;
        let mut change_set = ChangeSet::new(7);
        let history_builder = HistoryBuilder::new();
        modifier.process(
            0,
            &event(true, Some("NotFound"), Some(404)),
            &mut change_set,
            &history_builder,
            (),
        );
        assert_eq!(
            change_set.log_summary.as_deref(),
            Some("【NotFound(404)】delete /api/v1/namespaces/default/pods/nginx")
        );
        assert_eq!(change_set.severity_override, Some(Severity::Error));
    }
}
