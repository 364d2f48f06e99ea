//! Endpoint slice modifier (spec §4.8 "Endpoint slice"): two-pass.
//!
//! Pass 0 walks an EndpointSlice's own stream once to learn the services
//! that own it and the pods its endpoints have ever pointed at. Pass 1 runs
//! the actual per-endpoint and aggregated-service state machines. Pass-0
//! findings don't survive into pass 1 through the framework's `State`
//! (reset every pass) — they're kept in a `Mutex` on the modifier itself,
//! keyed by the pair's target path.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::history::{ChangeSet, HistoryBuilder};
use crate::node::NodeReader;
use crate::resource::{EndpointRevisionState, ResourceChangeEvent, ResourceIdentity, RevisionState, StagingResourceRevision, Verb};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::normalize_api_version;

#[derive(Debug, Clone, Default)]
struct PassZeroFindings {
    owning_services: BTreeSet<String>,
    known_pods: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct EndpointSliceState {
    seen_uids: BTreeSet<String>,
    last_endpoint_state: HashMap<String, EndpointRevisionState>,
    last_service_state: Option<EndpointRevisionState>,
    inferred_checked: bool,
}

#[derive(Debug, Default)]
pub struct EndpointSliceModifier {
    findings: Mutex<HashMap<String, PassZeroFindings>>,
}

impl EndpointSliceModifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_findings(&self, path: &str, mutator: impl FnOnce(&mut PassZeroFindings)) {
        let mut findings = self.findings.lock().expect("endpoint-slice findings mutex poisoned");
        mutator(findings.entry(path.to_string()).or_default());
    }

    fn findings_for(&self, path: &str) -> PassZeroFindings {
        self.findings
            .lock()
            .expect("endpoint-slice findings mutex poisoned")
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

fn aggregate_state(states: impl Iterator<Item = EndpointRevisionState>) -> Option<EndpointRevisionState> {
    let mut any = false;
    let mut all_terminating = true;
    let mut any_ready = false;
    for state in states {
        any = true;
        if state != EndpointRevisionState::Terminating {
            all_terminating = false;
        }
        if state == EndpointRevisionState::Ready {
            any_ready = true;
        }
    }
    if !any {
        return None;
    }
    Some(if all_terminating {
        EndpointRevisionState::Terminating
    } else if !any_ready {
        EndpointRevisionState::Unready
    } else {
        EndpointRevisionState::Ready
    })
}

struct CurrentEndpoint {
    uid: String,
    pod_path: String,
    state: EndpointRevisionState,
}

fn current_endpoints(reader: NodeReader<'_>, default_namespace: &str) -> Vec<CurrentEndpoint> {
    let Some(endpoints) = reader.get_reader("endpoints") else {
        return Vec::new();
    };
    let mut result = Vec::new();
    for entry in endpoints.as_sequence_readers() {
        let Some(target_ref) = entry.get_reader("targetRef") else {
            continue;
        };
        let (Some(uid), Some(name)) = (target_ref.read_string("uid"), target_ref.read_string("name")) else {
            continue;
        };
        let namespace = target_ref.read_string("namespace").unwrap_or_else(|| default_namespace.to_string());
        let pod_path = ResourceIdentity::new("core/v1", "pod", namespace, name).path();

        let terminating = entry.get_reader("conditions").and_then(|c| c.read_bool("terminating")).unwrap_or(false);
        let ready = entry.get_reader("conditions").and_then(|c| c.read_bool("ready")).unwrap_or(false);
        let state = if terminating {
            EndpointRevisionState::Terminating
        } else if ready {
            EndpointRevisionState::Ready
        } else {
            EndpointRevisionState::Unready
        };

        result.push(CurrentEndpoint { uid, pod_path, state });
    }
    result
}

impl ManifestHistoryModifier for EndpointSliceModifier {
    type State = EndpointSliceState;

    fn pass_count(&self) -> usize {
        2
    }

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        groups
            .values()
            .filter(|group| group.identity.singular_kind == "endpointslice")
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
        if event.event_type.is_source() {
            return state;
        }
        let Some(target) = event.target_resource.as_ref() else {
            return state;
        };
        let slice_path = target.path();
        let Some(body) = &event.target_body else {
            return state;
        };
        let reader = body.reader.reader();

        if pass_index == 0 {
            if let Some(owners) = reader.get_reader("metadata.ownerReferences") {
                for owner in owners.as_sequence_readers() {
                    let (Some(raw_api_version), Some(raw_kind), Some(name)) = (
                        owner.read_string("apiVersion"),
                        owner.read_string("kind"),
                        owner.read_string("name"),
                    ) else {
                        continue;
                    };
                    let api_version = normalize_api_version(&raw_api_version);
                    let kind = raw_kind.to_lowercase();
                    let service_path = ResourceIdentity::new(api_version, kind, target.namespace.clone(), name).path();
                    self.record_findings(&slice_path, |f| {
                        f.owning_services.insert(service_path.clone());
                    });
                }
            }
            for endpoint in current_endpoints(reader, &target.namespace) {
                self.record_findings(&slice_path, |f| {
                    f.known_pods.insert(endpoint.uid, endpoint.pod_path);
                });
            }
            return state;
        }

        let findings = self.findings_for(&slice_path);

        if event.event_type.is_deletion() {
            for pod_path in findings.known_pods.values() {
                change_set.add_revision(
                    pod_path.clone(),
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
            for service_path in &findings.owning_services {
                change_set.add_revision(
                    service_path.clone(),
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
            state.last_endpoint_state.clear();
            state.seen_uids.clear();
            state.last_service_state = None;
            return state;
        }

        let verb = event.log.audit().map(|a| a.operation.verb.clone()).unwrap_or(Verb::Other(String::new()));

        if event.event_type.is_creation() && !state.inferred_checked && !matches!(verb, Verb::Create) {
            state.inferred_checked = true;
            if let Some(created_at) = reader
                .read_string("metadata.creationTimestamp")
                .and_then(|raw| super::parse_rfc3339(&raw))
            {
                for pod_path in findings.known_pods.values() {
                    change_set.add_revision(
                        pod_path.clone(),
                        StagingResourceRevision::new(Verb::Other(String::new()), RevisionState::Endpoint(EndpointRevisionState::Ready), created_at)
                            .with_partial(true),
                    );
                }
                for service_path in &findings.owning_services {
                    change_set.add_revision(
                        service_path.clone(),
                        StagingResourceRevision::new(Verb::Other(String::new()), RevisionState::Endpoint(EndpointRevisionState::Ready), created_at)
                            .with_partial(true),
                    );
                }
            }
        }

        let current = current_endpoints(reader, &target.namespace);
        let current_uids: BTreeSet<String> = current.iter().map(|e| e.uid.clone()).collect();

        let removed: Vec<String> = state.seen_uids.difference(&current_uids).cloned().collect();
        for uid in removed {
            state.seen_uids.remove(&uid);
            state.last_endpoint_state.remove(&uid);
            if let Some(pod_path) = findings.known_pods.get(&uid) {
                change_set.add_revision(
                    pod_path.clone(),
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
        }

        for endpoint in &current {
            state.seen_uids.insert(endpoint.uid.clone());
            if state.last_endpoint_state.get(&endpoint.uid) == Some(&endpoint.state) {
                continue;
            }
            state.last_endpoint_state.insert(endpoint.uid.clone(), endpoint.state);
            change_set.add_revision(
                endpoint.pod_path.clone(),
                StagingResourceRevision::new(verb.clone(), RevisionState::Endpoint(endpoint.state), event.timestamp()),
            );
        }

        if let Some(aggregated) = aggregate_state(current.iter().map(|e| e.state)) {
            if state.last_service_state != Some(aggregated) {
                state.last_service_state = Some(aggregated);
                for service_path in &findings.owning_services {
                    change_set.add_revision(
                        service_path.clone(),
                        StagingResourceRevision::new(verb.clone(), RevisionState::Endpoint(aggregated), event.timestamp()),
                    );
                }
            }
        }

        state
    }
}
