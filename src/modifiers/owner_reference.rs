//! Owner reference modifier (spec §4.8 "Owner reference"): walks each
//! resource's own stream and records an alias from every owner named in
//! `metadata.ownerReferences` to a synthesized path under that owner.

use std::collections::BTreeSet;

use crate::history::{ChangeSet, HistoryBuilder};
use crate::resource::{owner_subresource_path, ResourceChangeEvent, ResourceIdentity, CLUSTER_SCOPE};

use super::framework::{ManifestHistoryModifier, ResourceGroups, ResourcePair};
use super::normalize_api_version;

#[derive(Debug, Clone, Default)]
pub struct OwnerReferenceModifier {
    /// `{apiVersion}#{kind}` keys of owner types that are cluster-scoped
    /// even when the owned resource is namespaced (from
    /// `InspectionConfig::owner_reference_non_namespaced_types`).
    non_namespaced_owner_types: BTreeSet<String>,
}

impl OwnerReferenceModifier {
    pub fn new(non_namespaced_owner_types: BTreeSet<String>) -> Self {
        Self {
            non_namespaced_owner_types,
        }
    }
}

impl ManifestHistoryModifier for OwnerReferenceModifier {
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
        let (Some(target), Some(body)) = (event.target_resource.as_ref(), &event.target_body) else {
            return state;
        };

        let owners = body.reader.reader().get_reader("metadata.ownerReferences");
        let Some(owners) = owners else {
            return state;
        };

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
            let owner_key = format!("{api_version}#{kind}");
            let namespace = if self.non_namespaced_owner_types.contains(&owner_key) {
                CLUSTER_SCOPE.to_string()
            } else {
                target.namespace.clone()
            };

            let owner_path = ResourceIdentity::new(api_version, kind, namespace, name).path();
            let synthesized = owner_subresource_path(&owner_path, &target.singular_kind, &target.name);
            change_set.add_alias(owner_path, synthesized);
        }

        state
    }
}
