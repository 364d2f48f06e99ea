//! Resource revision modifier (spec §4.8 "Resource revision (default)"):
//! mirrors the lifetime tracker's created/deleted logic but emits full
//! revisions, including an inferred creation revision and subresource
//! cleanup on parent deletion.

use chrono::Duration;

use crate::history::{ChangeSet, HistoryBuilder};
use crate::resource::{ResourceChangeEvent, RevisionState, StagingResourceRevision, Verb};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::parse_rfc3339;

/// Per-pair fold state: whether the inferred-creation revision has already
/// been considered for this pair's target stream.
#[derive(Debug, Default)]
pub struct ResourceRevisionState {
    inferred_creation_checked: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceRevisionModifier {
    inferred_creation_delta: Duration,
}

impl ResourceRevisionModifier {
    pub fn new(inferred_creation_delta: Duration) -> Self {
        Self {
            inferred_creation_delta,
        }
    }
}

impl ManifestHistoryModifier for ResourceRevisionModifier {
    type State = ResourceRevisionState;

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
        let mut pairs = Vec::with_capacity(groups.len());
        for group in groups.values() {
            if group.identity.subresource_name.is_none() {
                pairs.push(ResourcePair {
                    source: group.identity.clone(),
                    target: group.identity.clone(),
                });
                continue;
            }
            let parent_path = group.identity.parent().path();
            match groups.get(&parent_path) {
                Some(parent_group) => pairs.push(ResourcePair {
                    source: parent_group.identity.clone(),
                    target: group.identity.clone(),
                }),
                None => pairs.push(ResourcePair {
                    source: group.identity.clone(),
                    target: group.identity.clone(),
                }),
            }
        }
        pairs
    }

    fn process(
        &self,
        _pass_index: usize,
        event: &ResourceChangeEvent,
        change_set: &mut ChangeSet,
        _history_builder: &HistoryBuilder,
        mut state: Self::State,
    ) -> Self::State {
        let Some(target) = event.target_resource.as_ref() else {
            return state;
        };
        let target_path = target.path();

        if event.event_type.is_source() {
            if event.event_type.is_deletion() && event.source_resource.as_ref() != Some(target) {
                change_set.add_revision(
                    target_path,
                    StagingResourceRevision::new(Verb::Delete, RevisionState::Deleted, event.timestamp()),
                );
            }
            return state;
        }

        let audit = event.log.audit();
        let verb = audit.map(|a| a.operation.verb.clone()).unwrap_or(Verb::Other(String::new()));
        let requestor = audit.map(|a| a.principal.clone()).unwrap_or_default();

        if event.event_type.is_creation() && !state.inferred_creation_checked {
            state.inferred_creation_checked = true;
            if let Some(body) = &event.target_body {
                if let Some(created_at) = body
                    .reader
                    .reader()
                    .read_string("metadata.creationTimestamp")
                    .and_then(|raw| parse_rfc3339(&raw))
                {
                    if event.timestamp() - created_at > self.inferred_creation_delta {
                        change_set.add_revision(
                            target_path.clone(),
                            StagingResourceRevision::new(verb.clone(), RevisionState::Inferred, created_at)
                                .with_requestor(requestor.clone())
                                .with_body(body.reader.clone())
                                .with_partial(true),
                        );
                    }
                }
            }
        }

        let revision_state = if event.event_type.is_deletion() {
            RevisionState::Deleted
        } else if verb.is_deletive() {
            RevisionState::Deleting
        } else {
            RevisionState::Existing
        };

        let mut revision = StagingResourceRevision::new(verb, revision_state, event.timestamp()).with_requestor(requestor);
        if let Some(body) = &event.target_body {
            revision = revision.with_body(body.reader.clone());
        }
        change_set.add_revision(target_path, revision);

        state
    }
}
