//! `ChangeTargetGrouper` (spec §4.4): maps each log to the target
//! resource(s) it changes, expanding `DeleteCollection` and routing
//! subresource logs between the subresource and its parent.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::InspectionError;
use crate::log::{is_v1_status, Log};
use crate::node::StructuredNode;
use crate::resource::{singularize_plural_kind, KubernetesObjectOperation, ResourceIdentity, Verb};

/// Where an ambiguous subresource log should be routed when the response
/// body doesn't settle it (spec §4.4 rule 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRouting {
    Parent,
    Subresource,
}

/// The default-behavior override map, default `{"status" → Parent}` (spec
/// §6). Subresource names absent from the map default to `Subresource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubresourceDefaultBehavior(BTreeMap<String, TargetRouting>);

impl Default for SubresourceDefaultBehavior {
    fn default() -> Self {
        Self(BTreeMap::from([("status".to_string(), TargetRouting::Parent)]))
    }
}

impl SubresourceDefaultBehavior {
    pub fn resolve(&self, subresource_name: &str) -> TargetRouting {
        self.0.get(subresource_name).copied().unwrap_or(TargetRouting::Subresource)
    }
}

/// One target this log affects (spec §4.4 "target operation descriptor").
#[derive(Debug, Clone)]
pub struct TargetOperation {
    pub identity: ResourceIdentity,
}

/// Per-run grouper state: `(apiVersion, pluralKind, namespace) → observed
/// names`, accumulated strictly in log order (spec §4.4, §9 open question:
/// "treat log sorting as a hard precondition to grouping").
#[derive(Debug, Default)]
pub struct ChangeTargetGrouper {
    observed: BTreeMap<(String, String, String), BTreeSet<String>>,
    subresource_behavior: SubresourceDefaultBehavior,
}

impl ChangeTargetGrouper {
    pub fn new(subresource_behavior: SubresourceDefaultBehavior) -> Self {
        Self {
            observed: BTreeMap::new(),
            subresource_behavior,
        }
    }

    /// Map one log to its target(s). Requires the log's `kubernetes-audit`
    /// field set.
    pub fn group(&mut self, log: &Log) -> Result<Vec<TargetOperation>, InspectionError> {
        let audit = log.require_audit()?;
        let op = &audit.operation;
        let singular = singularize_plural_kind(&op.plural_kind);

        let targets = if op.verb == Verb::DeleteCollection {
            self.expand_delete_collection(op, audit.response_body.as_ref(), &singular)
        } else if op.subresource_name.is_none() {
            vec![TargetOperation {
                identity: op.to_identity(&singular),
            }]
        } else {
            vec![self.route_subresource(op, audit.response_body.as_ref(), &singular)]
        };

        // Cluster-scoped namespace is excluded from the observed-names map
        // (spec §4.4 "State"); a namespace-scoped create/update records its
        // name for later DeleteCollection expansion.
        if !op.namespace.is_empty() && !op.name.is_empty() {
            self.observed
                .entry((op.api_version.clone(), op.plural_kind.clone(), op.namespace.clone()))
                .or_default()
                .insert(op.name.clone());
        }

        Ok(targets)
    }

    fn expand_delete_collection(
        &self,
        op: &KubernetesObjectOperation,
        response: Option<&StructuredNode>,
        singular: &str,
    ) -> Vec<TargetOperation> {
        let items = response
            .and_then(|body| body.reader().get_reader("items"))
            .map(|reader| reader.as_sequence_readers())
            .unwrap_or_default();

        if !items.is_empty() {
            return items
                .into_iter()
                .filter_map(|item| item.read_string("metadata.name"))
                .map(|name| TargetOperation {
                    identity: op.with_name(name).to_identity(singular),
                })
                .collect();
        }

        let key = (op.api_version.clone(), op.plural_kind.clone(), op.namespace.clone());
        let mut targets: Vec<TargetOperation> = self
            .observed
            .get(&key)
            .into_iter()
            .flatten()
            .map(|name| TargetOperation {
                identity: op.with_name(name.clone()).to_identity(singular),
            })
            .collect();
        targets.push(TargetOperation {
            identity: op.with_name(String::new()).to_identity(singular),
        });
        targets
    }

    fn route_subresource(
        &self,
        op: &KubernetesObjectOperation,
        response: Option<&StructuredNode>,
        singular: &str,
    ) -> TargetOperation {
        if let Some(body) = response {
            if !is_v1_status(body) {
                if let Some(kind) = body.reader().read_string("kind") {
                    if kind.eq_ignore_ascii_case(singular) {
                        return TargetOperation {
                            identity: op.with_subresource_name(None).to_identity(singular),
                        };
                    }
                }
            }
        }

        let subresource = op.subresource_name.as_deref().unwrap_or_default();
        match self.subresource_behavior.resolve(subresource) {
            TargetRouting::Parent => TargetOperation {
                identity: op.with_subresource_name(None).to_identity(singular),
            },
            TargetRouting::Subresource => TargetOperation {
                identity: op.to_identity(singular),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{AuditFields, CommonFields, Severity};
    use chrono::Utc;

    fn op(verb: Verb, name: &str, subresource: Option<&str>) -> KubernetesObjectOperation {
        KubernetesObjectOperation {
            verb,
            api_version: "core/v1".into(),
            plural_kind: "pods".into(),
            namespace: "default".into(),
            name: name.into(),
            subresource_name: subresource.map(String::from),
        }
    }

    fn log_with_audit(operation: KubernetesObjectOperation, response_body: Option<StructuredNode>) -> Log {
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
            request_uri: "/api/v1/namespaces/default/pods".into(),
            status_code: Some(200),
            status_message: None,
            is_error: false,
            request_body: None,
            response_body,
        })
    }

    #[test]
    fn plain_operation_without_subresource_is_passthrough() {
        let mut grouper = ChangeTargetGrouper::default();
        let log = log_with_audit(op(Verb::Create, "nginx", None), None);
        let targets = grouper.group(&log).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].identity.path(), "core/v1#pod#default#nginx");
    }

    #[test]
    fn delete_collection_with_items_expands_per_item() {
        let mut grouper = ChangeTargetGrouper::default();
        let response = StructuredNode::mapping([(
            "items".into(),
            StructuredNode::sequence([
                StructuredNode::mapping([(
                    "metadata".into(),
                    StructuredNode::mapping([("name".into(), StructuredNode::string("p1"))]),
                )]),
                StructuredNode::mapping([(
                    "metadata".into(),
                    StructuredNode::mapping([("name".into(), StructuredNode::string("p2"))]),
                )]),
            ]),
        )]);
        let log = log_with_audit(op(Verb::DeleteCollection, "", None), Some(response));
        let targets = grouper.group(&log).unwrap();
        let paths: BTreeSet<String> = targets.iter().map(|t| t.identity.path()).collect();
        assert_eq!(
            paths,
            BTreeSet::from([
                "core/v1#pod#default#p1".to_string(),
                "core/v1#pod#default#p2".to_string(),
            ])
        );
    }

    #[test]
    fn delete_collection_without_items_uses_observed_names_plus_namespace() {
        let mut grouper = ChangeTargetGrouper::default();
        grouper.group(&log_with_audit(op(Verb::Create, "p1", None), None)).unwrap();
        grouper.group(&log_with_audit(op(Verb::Create, "p2", None), None)).unwrap();

        let targets = grouper
            .group(&log_with_audit(op(Verb::DeleteCollection, "", None), None))
            .unwrap();
        let paths: BTreeSet<String> = targets.iter().map(|t| t.identity.path()).collect();
        assert_eq!(
            paths,
            BTreeSet::from([
                "core/v1#pod#default#p1".to_string(),
                "core/v1#pod#default#p2".to_string(),
                "core/v1#pod#default#@namespace".to_string(),
            ])
        );
    }

    #[test]
    fn subresource_routed_to_parent_when_response_is_parent_kind() {
        let mut grouper = ChangeTargetGrouper::default();
        let response = StructuredNode::mapping([
            ("apiVersion".into(), StructuredNode::string("v1")),
            ("kind".into(), StructuredNode::string("Pod")),
        ]);
        let log = log_with_audit(op(Verb::Update, "nginx", Some("binding")), Some(response));
        let targets = grouper.group(&log).unwrap();
        assert_eq!(targets[0].identity.path(), "core/v1#pod#default#nginx");
    }

    #[test]
    fn status_subresource_defaults_to_parent_via_override_map() {
        let mut grouper = ChangeTargetGrouper::default();
        let log = log_with_audit(op(Verb::Patch, "nginx", Some("status")), None);
        let targets = grouper.group(&log).unwrap();
        assert_eq!(targets[0].identity.path(), "core/v1#pod#default#nginx");
    }

    #[test]
    fn unknown_subresource_defaults_to_subresource() {
        let mut grouper = ChangeTargetGrouper::default();
        let log = log_with_audit(op(Verb::Update, "nginx", Some("scale")), None);
        let targets = grouper.group(&log).unwrap();
        assert_eq!(targets[0].identity.path(), "core/v1#pod#default#nginx#scale");
    }
}
