//! Status condition modifier (spec §4.8 "Status condition"): a per-type
//! walker over `status.conditions[]`, reset (with a `minChangeTime` clamp)
//! whenever the resource is deleted so a recreated static pod's surviving
//! condition history doesn't bleed backwards across the reset.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::history::{ChangeSet, HistoryBuilder};
use crate::resource::{ConditionStatus, ResourceChangeEvent, RevisionState, StagingResourceRevision, Verb};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::parse_rfc3339;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConditionObservation {
    status: ConditionStatus,
    last_transition_time: Option<String>,
    last_heartbeat_time: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusConditionModifierState {
    last_observation: HashMap<String, ConditionObservation>,
    min_change_time: Option<DateTime<Utc>>,
    inferred_checked: bool,
}

#[derive(Debug)]
pub struct StatusConditionModifier {
    inferred_creation_delta: Duration,
    known_condition_types: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl StatusConditionModifier {
    pub fn new(inferred_creation_delta: Duration) -> Self {
        Self {
            inferred_creation_delta,
            known_condition_types: Mutex::new(HashMap::new()),
        }
    }

    fn record_type(&self, path: &str, condition_type: &str) {
        self.known_condition_types
            .lock()
            .expect("status-condition known-types mutex poisoned")
            .entry(path.to_string())
            .or_default()
            .insert(condition_type.to_string());
    }

    fn known_types_for(&self, path: &str) -> BTreeSet<String> {
        self.known_condition_types
            .lock()
            .expect("status-condition known-types mutex poisoned")
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

impl ManifestHistoryModifier for StatusConditionModifier {
    type State = StatusConditionModifierState;

    fn pass_count(&self) -> usize {
        2
    }

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        groups
            .values()
            .filter(|group| group.identity.subresource_name.is_none())
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
        let path = target.path();
        let Some(body) = &event.target_body else {
            return state;
        };
        let reader = body.reader.reader();

        if pass_index == 0 {
            if let Some(conditions) = reader.get_reader("status.conditions") {
                for entry in conditions.as_sequence_readers() {
                    if let Some(condition_type) = entry.read_string("type") {
                        self.record_type(&path, &condition_type);
                    }
                }
            }
            return state;
        }

        if event.event_type.is_deletion() {
            for condition_type in self.known_types_for(&path) {
                let condition_path = format!("{path}#condition:{condition_type}");
                change_set.add_revision(
                    condition_path,
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
            state.last_observation.clear();
            state.min_change_time = Some(event.timestamp());
            return state;
        }

        if event.event_type.is_creation() && !state.inferred_checked {
            state.inferred_checked = true;
            if let Some(created_at) = reader
                .read_string("metadata.creationTimestamp")
                .and_then(|raw| parse_rfc3339(&raw))
            {
                if event.timestamp() - created_at > self.inferred_creation_delta {
                    for condition_type in self.known_types_for(&path) {
                        let condition_path = format!("{path}#condition:{condition_type}");
                        change_set.add_revision(
                            condition_path,
                            StagingResourceRevision::new(
                                Verb::Other(String::new()),
                                RevisionState::Condition(ConditionStatus::NoAvailableInfo),
                                created_at,
                            )
                            .with_partial(true),
                        );
                    }
                }
            }
        }

        let Some(conditions) = reader.get_reader("status.conditions") else {
            return state;
        };

        for entry in conditions.as_sequence_readers() {
            let Some(condition_type) = entry.read_string("type") else {
                continue;
            };
            let observation = ConditionObservation {
                status: ConditionStatus::from_raw(entry.read_string("status").as_deref()),
                last_transition_time: entry.read_string("lastTransitionTime"),
                last_heartbeat_time: entry.read_string("lastHeartbeatTime"),
            };

            if state.last_observation.get(&condition_type) == Some(&observation) {
                continue;
            }
            state.last_observation.insert(condition_type.clone(), observation.clone());

            let mut change_time = event.timestamp();
            if let Some(min) = state.min_change_time {
                if change_time < min {
                    change_time = min;
                }
            }

            let condition_path = format!("{path}#condition:{condition_type}");
            let verb = event.log.audit().map(|a| a.operation.verb.clone()).unwrap_or(Verb::Other(String::new()));
            change_set.add_revision(
                condition_path,
                StagingResourceRevision::new(verb, RevisionState::Condition(observation.status), change_time),
            );
        }

        state
    }
}
