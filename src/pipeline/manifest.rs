//! `ManifestGenerator` (spec §4.5): folds a resource group's sorted log
//! stream into successive full-manifest snapshots.

use indexmap::IndexMap;

use crate::log::{is_v1_status, AuditFields, Log};
use crate::node::{merge, MergeConfig, StructuredNode};
use crate::resource::Verb;

const PLACEHOLDER_NOTE: &str = "Resource data is unavailable for this revision";

/// Running fold state for one resource group: the last known full manifest
/// plus its `apiVersion`/`kind`, needed to reconstruct `DeleteCollection`
/// list items (spec §4.5 step 3: "items omit these").
#[derive(Debug, Clone, Default)]
pub struct ManifestState {
    body: Option<StructuredNode>,
    api_version: Option<String>,
    kind: Option<String>,
}

/// The manifest this log observed, plus whether it was reconstructed from a
/// partial (request-body-only) source.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    pub body: StructuredNode,
    pub partial: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestGenerator {
    merge_config: MergeConfig,
}

impl ManifestGenerator {
    pub fn new(merge_config: MergeConfig) -> Self {
        Self { merge_config }
    }

    pub fn kubernetes_defaults() -> Self {
        Self::new(MergeConfig::kubernetes_defaults())
    }

    /// Advance `state` with one log from the group, returning the manifest
    /// snapshot this log observes. `resource_name` and `singular_kind` are
    /// the group's target identity, used to locate a `DeleteCollection`
    /// list item and to resolve the merge strategy registry.
    pub fn advance(
        &self,
        state: &mut ManifestState,
        log: &Log,
        resource_name: &str,
        singular_kind: &str,
    ) -> ManifestSnapshot {
        let Some(audit) = log.audit() else {
            return self.placeholder();
        };

        if audit.operation.verb == Verb::DeleteCollection {
            return self.advance_delete_collection(state, audit, resource_name);
        }

        let picked = match &audit.response_body {
            Some(body) if !is_v1_status(body) => Some((body.clone(), false)),
            _ => audit.request_body.as_ref().map(|body| (body.clone(), true)),
        };

        let Some((body, partial)) = picked else {
            return self.placeholder();
        };

        if audit.response_is_internal_delete_options() {
            return self.reuse(state);
        }

        let body = if audit.operation.verb == Verb::Patch && partial {
            match &state.body {
                Some(prev) => match merge(
                    prev,
                    &body,
                    &self.merge_config,
                    &audit.operation.api_version,
                    singular_kind,
                ) {
                    Ok(merged) => merged,
                    Err(_) => return self.reuse(state),
                },
                None => body,
            }
        } else {
            body
        };

        if let Some(av) = body.reader().read_string("apiVersion") {
            state.api_version = Some(av);
        }
        if let Some(k) = body.reader().read_string("kind") {
            state.kind = Some(k);
        }
        state.body = Some(body.clone());

        ManifestSnapshot { body, partial }
    }

    fn advance_delete_collection(
        &self,
        state: &mut ManifestState,
        audit: &AuditFields,
        resource_name: &str,
    ) -> ManifestSnapshot {
        let items = audit
            .response_body
            .as_ref()
            .and_then(|body| body.reader().get_reader("items"))
            .map(|reader| reader.as_sequence_readers());

        let Some(items) = items else {
            return self.reuse(state);
        };

        let found = items
            .iter()
            .find(|item| item.read_string("metadata.name").as_deref() == Some(resource_name));

        let Some(item) = found else {
            return self.reuse(state);
        };

        let mut synthesized: IndexMap<String, StructuredNode> = IndexMap::new();
        if let Some(av) = &state.api_version {
            synthesized.insert("apiVersion".to_string(), StructuredNode::string(av.clone()));
        }
        if let Some(k) = &state.kind {
            synthesized.insert("kind".to_string(), StructuredNode::string(k.clone()));
        }
        if let Some(item_map) = item.node().as_mapping() {
            for (key, value) in item_map {
                synthesized.insert(key.clone(), value.clone());
            }
        }

        let body = StructuredNode::Mapping(synthesized);
        state.body = Some(body.clone());
        ManifestSnapshot { body, partial: false }
    }

    fn reuse(&self, state: &ManifestState) -> ManifestSnapshot {
        match &state.body {
            Some(body) => ManifestSnapshot {
                body: body.clone(),
                partial: false,
            },
            None => self.placeholder(),
        }
    }

    fn placeholder(&self) -> ManifestSnapshot {
        ManifestSnapshot {
            body: StructuredNode::mapping([(
                "note".to_string(),
                StructuredNode::string(PLACEHOLDER_NOTE),
            )]),
            partial: true,
        }
    }
}
