//! `ResourceLifetimeTracker` (spec §4.6): annotates each per-resource log
//! with `resourceCreated`/`resourceDeleted` flags, folding verb, UID
//! transitions, grace periods, finalizers, and pod phase into a small
//! per-group state machine.

use std::collections::BTreeSet;

use crate::error::InspectionError;
use crate::log::Log;
use crate::node::StructuredNode;

/// Per-log output: whether this log represents the resource coming into
/// existence or going out of it (spec §4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifetimeAnnotation {
    pub resource_created: bool,
    pub resource_deleted: bool,
}

/// Folded state for one resource group (spec §4.6 `{wasCompletelyRemoved,
/// deletionStarted, prevUID}`).
#[derive(Debug, Clone, Default)]
pub struct LifetimeState {
    was_completely_removed: bool,
    deletion_started: bool,
    prev_uid: Option<String>,
}

/// `kindsToWaitExactDeletion` (spec §6), default `{core/v1#pod}`: kinds
/// whose deletion is only considered complete on an unambiguous signal
/// (body-less delete, terminal phase, or zero grace period) rather than
/// merely on `deletionStarted`.
#[derive(Debug, Clone)]
pub struct ResourceLifetimeTracker {
    wait_exact_deletion_kinds: BTreeSet<String>,
}

impl ResourceLifetimeTracker {
    pub fn new(wait_exact_deletion_kinds: BTreeSet<String>) -> Self {
        Self {
            wait_exact_deletion_kinds,
        }
    }

    /// Advance `state` with one log from the group. `kind_key` identifies
    /// the group's kind (e.g. `"core/v1#pod"`) for the wait-exact-deletion
    /// lookup.
    pub fn advance(
        &self,
        state: &mut LifetimeState,
        log: &Log,
        kind_key: &str,
    ) -> Result<LifetimeAnnotation, InspectionError> {
        let audit = log.require_audit()?;
        let op = &audit.operation;
        let body: Option<&StructuredNode> = audit.response_body.as_ref().or(audit.request_body.as_ref());
        let uid = body.and_then(|b| b.reader().read_string("metadata.uid"));

        let is_first = state.prev_uid.is_none();
        let uid_changed = matches!((&state.prev_uid, &uid), (Some(prev), Some(cur)) if prev != cur);

        if is_first || (op.verb.is_creative() && state.was_completely_removed) || uid_changed {
            state.was_completely_removed = false;
            state.deletion_started = false;
            if let Some(u) = uid {
                state.prev_uid = Some(u);
            }
            return Ok(LifetimeAnnotation {
                resource_created: true,
                resource_deleted: false,
            });
        }

        if op.verb.is_deletive() && state.was_completely_removed {
            return Ok(LifetimeAnnotation::default());
        }

        if let Some(u) = uid {
            state.prev_uid = Some(u);
        }

        let mut completed = false;
        let mut grace_detected = false;

        if op.verb.is_deletive() {
            match body {
                None => {
                    state.deletion_started = true;
                    completed = true;
                }
                Some(b) => {
                    state.deletion_started = true;
                    if b.reader().read_string("kind").as_deref() == Some("Pod") {
                        match b.reader().read_string("status.phase").as_deref() {
                            Some("Failed") | Some("Succeeded") => completed = true,
                            _ => grace_detected = true,
                        }
                    }
                }
            }
        }

        if let Some(b) = body {
            if let Some(grace_secs) = b.reader().read_int("metadata.deletionGracePeriodSeconds") {
                state.deletion_started = true;
                if grace_secs > 0 {
                    grace_detected = true;
                    completed = false;
                } else {
                    completed = true;
                    grace_detected = false;
                }
            }

            let has_finalizers = b
                .reader()
                .get_reader("metadata.finalizers")
                .map(|r| !r.as_sequence_readers().is_empty())
                .unwrap_or(false);
            if has_finalizers && state.deletion_started {
                grace_detected = true;
                completed = false;
            }

            if !grace_detected && !completed && b.reader().exists("metadata.deletionTimestamp") {
                completed = true;
            }
        }

        let mut annotation = LifetimeAnnotation::default();

        if state.deletion_started && !self.wait_exact_deletion_kinds.contains(kind_key) {
            annotation.resource_deleted = true;
        }

        if completed {
            annotation.resource_deleted = true;
            state.was_completely_removed = true;
        }

        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{AuditFields, CommonFields, Severity};
    use crate::resource::{KubernetesObjectOperation, Verb};
    use chrono::Utc;

    fn tracker() -> ResourceLifetimeTracker {
        ResourceLifetimeTracker::new(BTreeSet::from(["core/v1#pod".to_string()]))
    }

    fn op(verb: Verb) -> KubernetesObjectOperation {
        KubernetesObjectOperation {
            verb,
            api_version: "core/v1".into(),
            plural_kind: "pods".into(),
            namespace: "default".into(),
            name: "nginx".into(),
            subresource_name: None,
        }
    }

    fn log_with(operation: KubernetesObjectOperation, response: Option<StructuredNode>) -> Log {
        Log::new(
            0,
            StructuredNode::null(),
            CommonFields {
                timestamp: Utc::now(),
                severity: Severity::Info,
            },
        )
        .with_audit(AuditFields {
            operation,
            principal: "system:admin".into(),
            request_uri: "/api/v1/namespaces/default/pods/nginx".into(),
            status_code: Some(200),
            status_message: None,
            is_error: false,
            request_body: None,
            response_body: response,
        })
    }

    fn pod_body(uid: &str, phase: Option<&str>) -> StructuredNode {
        let metadata = vec![("uid".to_string(), StructuredNode::string(uid))];
        let status = phase
            .map(|p| vec![("phase".to_string(), StructuredNode::string(p))])
            .unwrap_or_default();
        StructuredNode::mapping([
            ("kind".to_string(), StructuredNode::string("Pod")),
            ("metadata".to_string(), StructuredNode::mapping(metadata)),
            ("status".to_string(), StructuredNode::mapping(status)),
        ])
    }

    #[test]
    fn first_log_marks_created() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        let log = log_with(op(Verb::Create), Some(pod_body("uid-1", None)));
        let annotation = tracker.advance(&mut state, &log, "core/v1#pod").unwrap();
        assert_eq!(annotation, LifetimeAnnotation { resource_created: true, resource_deleted: false });
    }

    #[test]
    fn uid_change_marks_created_again() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "core/v1#pod").unwrap();
        let annotation = tracker
            .advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-2", None))), "core/v1#pod")
            .unwrap();
        assert!(annotation.resource_created);
    }

    #[test]
    fn deletive_verb_without_body_marks_deleted() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "core/v1#pod").unwrap();
        let annotation = tracker.advance(&mut state, &log_with(op(Verb::Delete), None), "core/v1#pod").unwrap();
        assert!(annotation.resource_deleted);
        assert!(state.was_completely_removed);
    }

    #[test]
    fn pod_terminal_phase_completes_deletion() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "core/v1#pod").unwrap();
        let annotation = tracker
            .advance(&mut state, &log_with(op(Verb::Delete), Some(pod_body("uid-1", Some("Succeeded")))), "core/v1#pod")
            .unwrap();
        assert!(annotation.resource_deleted);
        assert!(state.was_completely_removed);
    }

    #[test]
    fn pod_running_phase_is_grace_without_resource_deleted() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "core/v1#pod").unwrap();
        let annotation = tracker
            .advance(&mut state, &log_with(op(Verb::Delete), Some(pod_body("uid-1", Some("Running")))), "core/v1#pod")
            .unwrap();
        assert!(!annotation.resource_deleted);
        assert!(!state.was_completely_removed);
    }

    #[test]
    fn non_wait_exact_kind_marks_deleted_once_deletion_started() {
        let tracker = ResourceLifetimeTracker::new(BTreeSet::new());
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "apps/v1#deployment").unwrap();
        let annotation = tracker
            .advance(&mut state, &log_with(op(Verb::Delete), Some(pod_body("uid-1", Some("Running")))), "apps/v1#deployment")
            .unwrap();
        assert!(annotation.resource_deleted);
    }

    #[test]
    fn deletive_while_completely_removed_is_ignored() {
        let tracker = tracker();
        let mut state = LifetimeState::default();
        tracker.advance(&mut state, &log_with(op(Verb::Create), Some(pod_body("uid-1", None))), "core/v1#pod").unwrap();
        tracker.advance(&mut state, &log_with(op(Verb::Delete), None), "core/v1#pod").unwrap();
        let annotation = tracker.advance(&mut state, &log_with(op(Verb::Delete), None), "core/v1#pod").unwrap();
        assert_eq!(annotation, LifetimeAnnotation::default());
    }
}
