//! Pod phase modifier (spec §4.8 "Pod phase"): two-pass walker over a pod's
//! own stream (pass 0) and its `binding` subresource (pass 1 source side),
//! emitting revisions on the synthesized `{node}#{namespace}/{pod}[uid]`
//! path rather than on the pod's own resource path.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Duration;

use crate::history::{ChangeSet, HistoryBuilder};
use crate::resource::{pod_phase_path, PodPhaseRevisionState, ResourceChangeEvent, ResourceIdentity, RevisionState, StagingResourceRevision, Verb};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::parse_rfc3339;

#[derive(Debug, Default)]
struct NodeBinding {
    node_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct PodPhaseState {
    last_phase: Option<PodPhaseRevisionState>,
    inferred_checked: bool,
}

#[derive(Debug, Clone)]
pub struct PodPhaseModifier {
    inferred_creation_delta: Duration,
    node_bindings: std::sync::Arc<Mutex<HashMap<String, NodeBinding>>>,
}

impl PodPhaseModifier {
    pub fn new(inferred_creation_delta: Duration) -> Self {
        Self {
            inferred_creation_delta,
            node_bindings: std::sync::Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn node_name_for(&self, pod_path: &str) -> Option<String> {
        self.node_bindings
            .lock()
            .expect("pod-phase node binding mutex poisoned")
            .get(pod_path)
            .and_then(|b| b.node_name.clone())
    }

    fn record_node_name(&self, pod_path: &str, node_name: String) {
        self.node_bindings
            .lock()
            .expect("pod-phase node binding mutex poisoned")
            .entry(pod_path.to_string())
            .or_default()
            .node_name = Some(node_name);
    }
}

impl ManifestHistoryModifier for PodPhaseModifier {
    type State = PodPhaseState;

    fn pass_count(&self) -> usize {
        2
    }

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        let mut pairs = Vec::new();
        for group in groups.values() {
            if group.identity.singular_kind != "pod" || group.identity.subresource_name.is_some() {
                continue;
            }
            let binding_id = ResourceIdentity::new(
                group.identity.api_version.clone(),
                "pod",
                group.identity.namespace.clone(),
                group.identity.name.clone(),
            )
            .with_subresource("binding");
            pairs.push(ResourcePair {
                source: binding_id,
                target: group.identity.clone(),
            });
        }
        pairs
    }

    fn process(
        &self,
        pass_index: usize,
        event: &ResourceChangeEvent,
        change_set: &mut ChangeSet,
        _history_builder: &HistoryBuilder,
        mut state: Self::State,
    ) -> Self::State {
        let Some(target) = event.target_resource.as_ref() else {
            return state;
        };
        let pod_path = target.path();

        if pass_index == 0 {
            if event.event_type.is_target() {
                if let Some(body) = &event.target_body {
                    if let Some(uid) = body.reader.reader().read_string("metadata.uid") {
                        if let Some(node_name) = body.reader.reader().read_string("spec.nodeName") {
                            let _ = uid;
                            self.record_node_name(&pod_path, node_name);
                        }
                    }
                }
            }
            return state;
        }

        let Some(uid) = event
            .target_body
            .as_ref()
            .and_then(|b| b.reader.reader().read_string("metadata.uid"))
        else {
            return state;
        };
        let Some(node_name) = self.node_name_for(&pod_path) else {
            return state;
        };
        let phase_path = pod_phase_path(&node_name, &target.namespace, &target.name, &uid);

        if event.event_type.is_source() {
            if event.event_type.is_creation() {
                change_set.add_revision(
                    phase_path,
                    StagingResourceRevision::new(Verb::Create, RevisionState::PodPhase(PodPhaseRevisionState::Scheduled), event.timestamp()),
                );
            }
            return state;
        }

        if event.event_type.is_deletion() {
            change_set.add_revision(
                phase_path,
                StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
            );
            state.last_phase = None;
            return state;
        }

        if event.event_type.is_creation() && !state.inferred_checked {
            state.inferred_checked = true;
            if let Some(body) = &event.target_body {
                if let Some(created_at) = body
                    .reader
                    .reader()
                    .read_string("metadata.creationTimestamp")
                    .and_then(|raw| parse_rfc3339(&raw))
                {
                    if event.timestamp() - created_at > self.inferred_creation_delta {
                        change_set.add_revision(
                            phase_path.clone(),
                            StagingResourceRevision::new(
                                Verb::Other(String::new()),
                                RevisionState::PodPhase(PodPhaseRevisionState::Unknown),
                                created_at,
                            )
                            .with_partial(true),
                        );
                    }
                }
            }
        }

        let raw_phase = event
            .target_body
            .as_ref()
            .and_then(|b| b.reader.reader().read_string("status.phase"));
        let phase = PodPhaseRevisionState::from_raw_phase(raw_phase.as_deref());

        if state.last_phase != Some(phase) {
            state.last_phase = Some(phase);
            let verb = event.log.audit().map(|a| a.operation.verb.clone()).unwrap_or(Verb::Other(String::new()));
            change_set.add_revision(
                phase_path,
                StagingResourceRevision::new(verb, RevisionState::PodPhase(phase), event.timestamp()),
            );
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryBuilder;
    use crate::log::{AuditFields, CommonFields, Log, Severity};
    use crate::node::StructuredNode;
    use crate::resource::{KubernetesObjectOperation, ResourceBody, ResourceEventType};
    use chrono::Utc;
    use std::sync::Arc;

    fn pod_body(uid: &str, node_name: &str, phase: &str) -> StructuredNode {
        StructuredNode::mapping([
            ("metadata".to_string(), StructuredNode::mapping([("uid".to_string(), StructuredNode::string(uid))])),
            (
                "spec".to_string(),
                StructuredNode::mapping([("nodeName".to_string(), StructuredNode::string(node_name))]),
            ),
            (
                "status".to_string(),
                StructuredNode::mapping([("phase".to_string(), StructuredNode::string(phase))]),
            ),
        ])
    }

    fn target_event(event_type: ResourceEventType, id: &ResourceIdentity, body: StructuredNode) -> ResourceChangeEvent {
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
                    verb: Verb::Update,
                    api_version: "core/v1".into(),
                    plural_kind: "pods".into(),
                    namespace: "default".into(),
                    name: "nginx".into(),
                    subresource_name: None,
                },
                principal: "system:admin".into(),
                request_uri: "/api/v1/namespaces/default/pods/nginx".into(),
                status_code: Some(200),
                status_message: None,
                is_error: false,
                request_body: None,
                response_body: None,
            }),
        );
        ResourceChangeEvent {
            event_type,
            log,
            source_resource: Some(id.clone()),
            target_resource: Some(id.clone()),
            source_body: None,
            target_body: Some(ResourceBody::new(body)),
        }
    }

    #[test]
    fn pass_zero_records_node_binding_then_pass_one_emits_phase_revision() {
        let modifier = PodPhaseModifier::new(Duration::seconds(5));
        let id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        let history_builder = HistoryBuilder::new();

        let mut change_set0 = ChangeSet::new(0);
        let event0 = target_event(ResourceEventType::TargetCreation, &id, pod_body("uid-1", "node-1", "Pending"));
        modifier.process(0, &event0, &mut change_set0, &history_builder, PodPhaseState::default());
        assert_eq!(change_set0.touched_paths().count(), 0);

        let mut change_set1 = ChangeSet::new(1);
        let event1 = target_event(ResourceEventType::TargetModification, &id, pod_body("uid-1", "node-1", "Running"));
        modifier.process(1, &event1, &mut change_set1, &history_builder, PodPhaseState::default());
        let touched: Vec<_> = change_set1.touched_paths().collect();
        assert_eq!(touched, vec!["core/v1#node#cluster-scope#node-1#default/nginx[uid-1]"]);
    }
}
