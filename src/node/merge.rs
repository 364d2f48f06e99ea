use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use super::StructuredNode;

/// Array-merge strategy (spec §4.3), resolved per `(apiVersion, singularKind,
/// fieldPath)` by a [`MergeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeArrayStrategy {
    /// The patch's array wholesale replaces the previous one.
    Replace,
    /// The patch's elements are appended to the previous array.
    Append,
    /// Elements are matched by `keyField`; matching pairs are merged
    /// (recursively), unmatched previous elements are retained, unmatched
    /// patch elements are appended.
    MergeByKey { key_field: String },
}

#[derive(Debug)]
pub struct MergeError(pub String);

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MergeError {}

/// A `(apiVersion, singularKind) → MergeArrayStrategy resolver` registry
/// (spec §6 "resource merge config registry").
///
/// Falls back to [`MergeArrayStrategy::Replace`] for any field path with no
/// registered strategy — the conservative choice when strategic-merge
/// metadata for a field is unknown.
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    strategies: HashMap<(String, String, String), MergeArrayStrategy>,
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        api_version: impl Into<String>,
        singular_kind: impl Into<String>,
        field_path: impl Into<String>,
        strategy: MergeArrayStrategy,
    ) -> &mut Self {
        self.strategies
            .insert((api_version.into(), singular_kind.into(), field_path.into()), strategy);
        self
    }

    /// The registry Kubernetes itself ships for the core well-known types:
    /// containers/volumes/ports merge by name, conditions merge by type,
    /// ownerReferences merge by uid, finalizers append.
    pub fn kubernetes_defaults() -> Self {
        let mut config = Self::new();
        for kind in ["pod", "podtemplate"] {
            config.register(
                "core/v1",
                kind,
                "spec.containers",
                MergeArrayStrategy::MergeByKey {
                    key_field: "name".to_string(),
                },
            );
            config.register(
                "core/v1",
                kind,
                "spec.initContainers",
                MergeArrayStrategy::MergeByKey {
                    key_field: "name".to_string(),
                },
            );
            config.register(
                "core/v1",
                kind,
                "spec.volumes",
                MergeArrayStrategy::MergeByKey {
                    key_field: "name".to_string(),
                },
            );
        }
        config
    }

    fn resolve(&self, api_version: &str, singular_kind: &str, field_path: &str) -> MergeArrayStrategy {
        self.strategies
            .get(&(
                api_version.to_string(),
                singular_kind.to_string(),
                field_path.to_string(),
            ))
            .cloned()
            .unwrap_or_else(default_strategy_for_path)
    }
}

/// Well-known Kubernetes list fields that merge by key even without an
/// explicit per-kind registration (`metadata.ownerReferences`,
/// `status.conditions`, …), falling back to `Replace` otherwise.
fn default_strategy_for_path(field_path: &str) -> MergeArrayStrategy {
    match field_path {
        "metadata.ownerReferences" => MergeArrayStrategy::MergeByKey {
            key_field: "uid".to_string(),
        },
        "metadata.finalizers" => MergeArrayStrategy::Append,
        "status.conditions" => MergeArrayStrategy::MergeByKey {
            key_field: "type".to_string(),
        },
        _ => MergeArrayStrategy::Replace,
    }
}

/// `Merge(prev, patch, config)` (spec §4.3): combine a prior full manifest
/// with a PATCH body into a new full manifest.
pub fn merge(
    prev: &StructuredNode,
    patch: &StructuredNode,
    config: &MergeConfig,
    api_version: &str,
    singular_kind: &str,
) -> Result<StructuredNode, MergeError> {
    merge_at(prev, patch, config, api_version, singular_kind, "")
}

fn merge_at(
    prev: &StructuredNode,
    patch: &StructuredNode,
    config: &MergeConfig,
    api_version: &str,
    singular_kind: &str,
    field_path: &str,
) -> Result<StructuredNode, MergeError> {
    match (prev, patch) {
        (_, StructuredNode::Null) => Ok(prev.clone()),
        (StructuredNode::Mapping(prev_map), StructuredNode::Mapping(patch_map)) => {
            let mut result: IndexMap<String, StructuredNode> = IndexMap::new();
            // Keys in `patch` override or recurse; keys absent in `patch` are retained.
            for (key, prev_value) in prev_map {
                result.insert(key.clone(), prev_value.clone());
            }
            for (key, patch_value) in patch_map {
                let child_path = if field_path.is_empty() {
                    key.clone()
                } else {
                    format!("{field_path}.{key}")
                };
                let merged = match prev_map.get(key) {
                    Some(prev_value) => {
                        merge_at(prev_value, patch_value, config, api_version, singular_kind, &child_path)?
                    }
                    None => {
                        merge_at(&StructuredNode::Null, patch_value, config, api_version, singular_kind, &child_path)?
                    }
                };
                result.insert(key.clone(), merged);
            }
            Ok(StructuredNode::Mapping(result))
        }
        (StructuredNode::Sequence(prev_items), StructuredNode::Sequence(patch_items)) => {
            let strategy = config.resolve(api_version, singular_kind, field_path);
            merge_sequences(prev_items, patch_items, &strategy, config, api_version, singular_kind, field_path)
        }
        // Scalars in `patch` replace those in `prev`; a type mismatch (e.g.
        // prev is a mapping, patch is a scalar) is also a replacement.
        (_, patch_value) => Ok(patch_value.clone()),
    }
}

fn merge_sequences(
    prev_items: &[StructuredNode],
    patch_items: &[StructuredNode],
    strategy: &MergeArrayStrategy,
    config: &MergeConfig,
    api_version: &str,
    singular_kind: &str,
    field_path: &str,
) -> Result<StructuredNode, MergeError> {
    match strategy {
        MergeArrayStrategy::Replace => Ok(StructuredNode::Sequence(patch_items.to_vec())),
        MergeArrayStrategy::Append => {
            let mut merged = prev_items.to_vec();
            merged.extend(patch_items.iter().cloned());
            Ok(StructuredNode::Sequence(merged))
        }
        MergeArrayStrategy::MergeByKey { key_field } => {
            let mut result: Vec<StructuredNode> = Vec::new();
            let mut matched_patch_indices = Vec::new();

            for prev_item in prev_items {
                let prev_key = item_key(prev_item, key_field);
                match prev_key.as_deref().and_then(|k| {
                    patch_items
                        .iter()
                        .enumerate()
                        .find(|(_, p)| item_key(p, key_field).as_deref() == Some(k))
                }) {
                    Some((idx, patch_item)) => {
                        matched_patch_indices.push(idx);
                        result.push(merge_at(
                            prev_item,
                            patch_item,
                            config,
                            api_version,
                            singular_kind,
                            field_path,
                        )?);
                    }
                    None => result.push(prev_item.clone()),
                }
            }
            for (idx, patch_item) in patch_items.iter().enumerate() {
                if !matched_patch_indices.contains(&idx) {
                    result.push(patch_item.clone());
                }
            }
            Ok(StructuredNode::Sequence(result))
        }
    }
}

fn item_key(item: &StructuredNode, key_field: &str) -> Option<String> {
    item.reader().read_string(key_field)
}
