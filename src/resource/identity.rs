use std::fmt;

use super::CLUSTER_SCOPE;

/// Which of the three identity shapes (spec §3) this `ResourceIdentity` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceIdentityKind {
    /// `name` is empty: the identity addresses a whole namespace.
    Namespace,
    /// `subresource_name` is non-empty: the identity addresses a subresource.
    Subresource,
    /// The common case: a plain named resource.
    Resource,
}

/// `{apiVersion, kind, name, namespace, subresourceName}` (spec §3).
///
/// `namespace` is the literal string `"cluster-scope"` for cluster-scoped
/// resources, never empty — callers construct via [`ResourceIdentity::new`]
/// or [`ResourceIdentity::cluster_scoped`] so this invariant always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub api_version: String,
    /// Singular, lower-cased kind (e.g. `"pod"`, `"replicaset"`) as used in
    /// canonical path strings.
    pub singular_kind: String,
    pub namespace: String,
    pub name: String,
    pub subresource_name: Option<String>,
}

impl ResourceIdentity {
    pub fn new(
        api_version: impl Into<String>,
        singular_kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            api_version: api_version.into(),
            singular_kind: singular_kind.into(),
            namespace: if namespace.is_empty() {
                CLUSTER_SCOPE.to_string()
            } else {
                namespace
            },
            name: name.into(),
            subresource_name: None,
        }
    }

    pub fn cluster_scoped(
        api_version: impl Into<String>,
        singular_kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(api_version, singular_kind, CLUSTER_SCOPE, name)
    }

    /// A namespace-level identity: addresses the namespace itself, `name` empty.
    pub fn namespace_level(api_version: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(api_version, "namespace", CLUSTER_SCOPE, namespace)
    }

    pub fn with_subresource(mut self, subresource_name: impl Into<String>) -> Self {
        let s = subresource_name.into();
        self.subresource_name = if s.is_empty() { None } else { Some(s) };
        self
    }

    pub fn kind(&self) -> ResourceIdentityKind {
        if self.name.is_empty() {
            ResourceIdentityKind::Namespace
        } else if self.subresource_name.is_some() {
            ResourceIdentityKind::Subresource
        } else {
            ResourceIdentityKind::Resource
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace == CLUSTER_SCOPE
    }

    /// Canonical path string (spec §6 "Output" path formats).
    pub fn path(&self) -> String {
        self.to_string()
    }

    /// The identity of the parent resource (subresource stripped), if this
    /// identity names a subresource; otherwise `self` unchanged.
    pub fn parent(&self) -> ResourceIdentity {
        let mut parent = self.clone();
        parent.subresource_name = None;
        parent
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ResourceIdentityKind::Namespace => {
                write!(
                    f,
                    "{}#{}#{}#@namespace",
                    self.api_version, self.singular_kind, self.namespace
                )
            }
            ResourceIdentityKind::Subresource => {
                write!(
                    f,
                    "{}#{}#{}#{}#{}",
                    self.api_version,
                    self.singular_kind,
                    self.namespace,
                    self.name,
                    self.subresource_name.as_deref().unwrap_or_default()
                )
            }
            ResourceIdentityKind::Resource => {
                write!(
                    f,
                    "{}#{}#{}#{}",
                    self.api_version, self.singular_kind, self.namespace, self.name
                )
            }
        }
    }
}

/// Synthesize the pod-phase path: `core/v1#node#cluster-scope#{node}#{namespace}/{pod}[{uid}]`.
pub fn pod_phase_path(node_name: &str, pod_namespace: &str, pod_name: &str, uid: &str) -> String {
    format!("core/v1#node#{CLUSTER_SCOPE}#{node_name}#{pod_namespace}/{pod_name}[{uid}]")
}

/// Synthesize a container-state-machine access path: `{base}#{direction}[:{container}]`.
pub fn csm_access_path(base: &str, direction: &str, container_name: Option<&str>) -> String {
    match container_name {
        Some(name) => format!("{base}#{direction}:{name}"),
        None => format!("{base}#{direction}"),
    }
}

/// Synthesize an owner-reference alias path: `{owner_path}/{subresource}/{owned_name}`.
pub fn owner_subresource_path(owner_path: &str, subresource: &str, owned_name: &str) -> String {
    format!("{owner_path}/{subresource}/{owned_name}")
}
