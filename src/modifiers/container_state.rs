//! Container state modifier (spec §4.8 "Container state"): a small state
//! machine per `(name, kind)` container identity, keyed on the
//! `status.{containerStatuses,initContainerStatuses,ephemeralContainerStatuses}`
//! arrays of a pod manifest.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::history::{ChangeSet, HistoryBuilder};
use crate::node::NodeReader;
use crate::resource::{csm_access_path, ContainerRevisionState, ResourceChangeEvent, ResourceIdentity, RevisionState, StagingResourceRevision, Verb};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::parse_rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum ContainerKind {
    Container,
    Init,
    Ephemeral,
}

impl ContainerKind {
    fn direction(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Init => "initContainer",
            Self::Ephemeral => "ephemeralContainer",
        }
    }

    const ALL: [(&'static str, Self); 3] = [
        ("containerStatuses", Self::Container),
        ("initContainerStatuses", Self::Init),
        ("ephemeralContainerStatuses", Self::Ephemeral),
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct ContainerIdentity {
    name: String,
    kind: ContainerKind,
}

#[derive(Debug, Default)]
pub struct ContainerStateModifierState {
    last_state: HashMap<ContainerIdentity, ContainerRevisionState>,
}

#[derive(Debug, Default)]
pub struct ContainerStateModifier {
    known_containers: Mutex<HashMap<String, BTreeSet<ContainerIdentity>>>,
}

impl ContainerStateModifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_known(&self, pod_path: &str, identity: ContainerIdentity) {
        self.known_containers
            .lock()
            .expect("container-state known-containers mutex poisoned")
            .entry(pod_path.to_string())
            .or_default()
            .insert(identity);
    }

    fn known_for(&self, pod_path: &str) -> BTreeSet<ContainerIdentity> {
        self.known_containers
            .lock()
            .expect("container-state known-containers mutex poisoned")
            .get(pod_path)
            .cloned()
            .unwrap_or_default()
    }
}

fn recognize_state(status: NodeReader<'_>) -> (ContainerRevisionState, Option<chrono::DateTime<chrono::Utc>>) {
    if let Some(terminated) = status.get_reader("state.terminated") {
        let exit_code = terminated.read_int("exitCode").unwrap_or(1);
        let finished_at = terminated
            .read_string("finishedAt")
            .and_then(|raw| parse_rfc3339(&raw))
            .or_else(|| terminated.read_string("startedAt").and_then(|raw| parse_rfc3339(&raw)));
        let state = if exit_code == 0 {
            ContainerRevisionState::TerminatedSuccess
        } else {
            ContainerRevisionState::TerminatedError
        };
        return (state, finished_at);
    }

    if let Some(running) = status.get_reader("state.running") {
        let ready = status.read_bool("ready").unwrap_or(false);
        let state = if ready {
            ContainerRevisionState::RunningReady
        } else {
            ContainerRevisionState::RunningNonReady
        };
        let _ = running;
        return (state, None);
    }

    if status.read_bool("started") == Some(true) {
        return (ContainerRevisionState::Started, None);
    }

    if status.get_reader("state.waiting").is_some() {
        return (ContainerRevisionState::Waiting, None);
    }

    (ContainerRevisionState::StatusNotAvailable, None)
}

impl ManifestHistoryModifier for ContainerStateModifier {
    type State = ContainerStateModifierState;

    fn pass_count(&self) -> usize {
        2
    }

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        groups
            .values()
            .filter(|group| group.identity.singular_kind == "pod" && group.identity.subresource_name.is_none())
            .map(|group| ResourcePair {
                source: group.identity.clone(),
                target: group.identity.clone(),
            })
            .collect()
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
        if event.event_type.is_source() {
            return state;
        }
        let pod_path = target.path();

        let Some(body) = &event.target_body else {
            return state;
        };
        let reader = body.reader.reader();

        if pass_index == 0 {
            for (field, kind) in ContainerKind::ALL {
                let Some(statuses) = reader.get_reader(&format!("status.{field}")) else {
                    continue;
                };
                for entry in statuses.as_sequence_readers() {
                    if let Some(name) = entry.read_string("name") {
                        self.record_known(&pod_path, ContainerIdentity { name, kind });
                    }
                }
            }
            return state;
        }

        if event.event_type.is_deletion() {
            for identity in self.known_for(&pod_path) {
                let access_path = csm_access_path(&pod_path, identity.kind.direction(), Some(&identity.name));
                change_set.add_revision(
                    access_path,
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
            state.last_state.clear();
            return state;
        }

        for (field, kind) in ContainerKind::ALL {
            let Some(statuses) = reader.get_reader(&format!("status.{field}")) else {
                continue;
            };
            for entry in statuses.as_sequence_readers() {
                let Some(name) = entry.read_string("name") else {
                    continue;
                };
                let identity = ContainerIdentity { name: name.clone(), kind };
                let (recognized, terminal_time) = recognize_state(entry);

                if state.last_state.get(&identity) == Some(&recognized) {
                    continue;
                }
                state.last_state.insert(identity.clone(), recognized);

                let access_path = csm_access_path(&pod_path, kind.direction(), Some(&name));
                let change_time = terminal_time.unwrap_or_else(|| event.timestamp());
                let verb = event.log.audit().map(|a| a.operation.verb.clone()).unwrap_or(Verb::Other(String::new()));
                change_set.add_revision(
                    access_path,
                    StagingResourceRevision::new(verb, RevisionState::Container(recognized), change_time),
                );
            }
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

    fn pod_body_with_container(ready: bool, running: bool) -> StructuredNode {
        let state = if running {
            StructuredNode::mapping([("running".to_string(), StructuredNode::mapping([]))])
        } else {
            StructuredNode::mapping([("waiting".to_string(), StructuredNode::mapping([("reason".to_string(), StructuredNode::string("PodInitializing"))]))])
        };
        StructuredNode::mapping([(
            "status".to_string(),
            StructuredNode::mapping([(
                "containerStatuses".to_string(),
                StructuredNode::sequence([StructuredNode::mapping([
                    ("name".to_string(), StructuredNode::string("app")),
                    ("ready".to_string(), StructuredNode::bool(ready)),
                    ("state".to_string(), state),
                ])]),
            )]),
        )])
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
                request_uri: "/api/v1/namespaces/default/pods/nginx/status".into(),
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
    fn running_ready_container_emits_revision_on_csm_path() {
        let modifier = ContainerStateModifier::new();
        let id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        let history_builder = HistoryBuilder::new();

        let mut cs0 = ChangeSet::new(0);
        modifier.process(0, &target_event(ResourceEventType::TargetCreation, &id, pod_body_with_container(false, false)), &mut cs0, &history_builder, ContainerStateModifierState::default());

        let mut cs1 = ChangeSet::new(1);
        modifier.process(1, &target_event(ResourceEventType::TargetModification, &id, pod_body_with_container(true, true)), &mut cs1, &history_builder, ContainerStateModifierState::default());
        let touched: Vec<_> = cs1.touched_paths().collect();
        assert_eq!(touched, vec!["core/v1#pod#default#nginx#container:app"]);
    }

    #[test]
    fn pod_deletion_emits_deleted_revision_for_known_containers() {
        let modifier = ContainerStateModifier::new();
        let id = ResourceIdentity::new("core/v1", "pod", "default", "nginx");
        let history_builder = HistoryBuilder::new();

        let mut cs0 = ChangeSet::new(0);
        modifier.process(0, &target_event(ResourceEventType::TargetCreation, &id, pod_body_with_container(false, false)), &mut cs0, &history_builder, ContainerStateModifierState::default());

        let mut cs1 = ChangeSet::new(1);
        modifier.process(1, &target_event(ResourceEventType::TargetDeletion, &id, StructuredNode::null()), &mut cs1, &history_builder, ContainerStateModifierState::default());
        let touched: Vec<_> = cs1.touched_paths().collect();
        assert_eq!(touched, vec!["core/v1#pod#default#nginx#container:app"]);
    }
}
