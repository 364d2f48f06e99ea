use std::fmt;

use super::identity::ResourceIdentity;
use super::CLUSTER_SCOPE;

/// `verb ∈ {Create, Update, Patch, Delete, DeleteCollection, Get, …}` (spec §3).
///
/// Kept open-ended via `Other` because audit logs carry arbitrary verbs
/// (`list`, `watch`, `connect`, …) that the reconstruction pipeline never
/// needs to special-case but must still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Update,
    Patch,
    Delete,
    DeleteCollection,
    Get,
    List,
    Watch,
    Other(String),
}

impl Verb {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "create" => Self::Create,
            "update" => Self::Update,
            "patch" => Self::Patch,
            "delete" => Self::Delete,
            "deletecollection" => Self::DeleteCollection,
            "get" => Self::Get,
            "list" => Self::List,
            "watch" => Self::Watch,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::DeleteCollection => "deletecollection",
            Self::Get => "get",
            Self::List => "list",
            Self::Watch => "watch",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Verbs that create or re-create a resource (spec §4.6 "creative verb").
    pub fn is_creative(&self) -> bool {
        matches!(self, Self::Create)
    }

    /// Verbs that initiate deletion (spec §4.6 "deletive verb").
    pub fn is_deletive(&self) -> bool {
        matches!(self, Self::Delete | Self::DeleteCollection)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{verb, apiVersion, pluralKind, namespace, name, subresourceName}` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesObjectOperation {
    pub verb: Verb,
    pub api_version: String,
    pub plural_kind: String,
    pub namespace: String,
    pub name: String,
    pub subresource_name: Option<String>,
}

impl KubernetesObjectOperation {
    pub fn namespace_or_cluster_scope(&self) -> &str {
        if self.namespace.is_empty() {
            CLUSTER_SCOPE
        } else {
            &self.namespace
        }
    }

    /// Build the `ResourceIdentity` this operation targets, given the
    /// resolved singular kind (plural→singular mapping lives with the
    /// caller, which already knows the manifest's `kind` field).
    pub fn to_identity(&self, singular_kind: &str) -> ResourceIdentity {
        let mut id = ResourceIdentity::new(
            self.api_version.clone(),
            singular_kind,
            self.namespace_or_cluster_scope(),
            self.name.clone(),
        );
        if let Some(sub) = &self.subresource_name {
            id = id.with_subresource(sub.clone());
        }
        id
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut op = self.clone();
        op.name = name.into();
        op
    }

    pub fn with_subresource_name(&self, subresource_name: Option<String>) -> Self {
        let mut op = self.clone();
        op.subresource_name = subresource_name;
        op
    }
}

/// Best-effort plural→singular Kubernetes kind mapping (spec §4.4 needs the
/// op's singular kind to compare against a response body's `kind`, but
/// `KubernetesObjectOperation` only ever carries the plural form audit logs
/// use). Covers the well-known core/apps kinds with irregular pluralization;
/// falls back to stripping a trailing `s`.
pub fn singularize_plural_kind(plural_kind: &str) -> String {
    match plural_kind {
        "endpoints" => "endpoint".to_string(),
        "endpointslices" => "endpointslice".to_string(),
        "ingresses" => "ingress".to_string(),
        "networkpolicies" => "networkpolicy".to_string(),
        "securitycontextconstraints" => "securitycontextconstraint".to_string(),
        other => other.strip_suffix('s').unwrap_or(other).to_string(),
    }
}
