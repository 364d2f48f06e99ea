use chrono::{DateTime, Utc};

use crate::node::StructuredNode;
use crate::resource::KubernetesObjectOperation;

/// Log severity, part of the `common` field set (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// `common` field set: `{timestamp, severity}` (spec §3).
#[derive(Debug, Clone)]
pub struct CommonFields {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

/// `kubernetes-audit` field set (spec §3): the decoded Kubernetes audit
/// record for a single API request.
#[derive(Debug, Clone)]
pub struct AuditFields {
    pub operation: KubernetesObjectOperation,
    pub principal: String,
    pub request_uri: String,
    pub status_code: Option<u32>,
    pub status_message: Option<String>,
    pub is_error: bool,
    pub request_body: Option<StructuredNode>,
    pub response_body: Option<StructuredNode>,
}

impl AuditFields {
    /// True when the response body is the internal `meta.k8s.io/__internal`
    /// `DeleteOptions` wrapper (spec §4.5 step 5).
    pub fn response_is_internal_delete_options(&self) -> bool {
        self.response_body
            .as_ref()
            .is_some_and(is_internal_delete_options)
    }

    /// True when `response_body`'s `apiVersion`/`kind` is `v1`/`Status`
    /// (spec §4.5 step 1, §4.4 rule 3).
    pub fn response_is_status(&self) -> bool {
        self.response_body.as_ref().is_some_and(is_v1_status)
    }
}

pub fn is_v1_status(node: &StructuredNode) -> bool {
    let reader = node.reader();
    reader.read_string("apiVersion").as_deref() == Some("v1")
        && reader.read_string("kind").as_deref() == Some("Status")
}

pub fn is_internal_delete_options(node: &StructuredNode) -> bool {
    let reader = node.reader();
    reader.read_string("apiVersion").as_deref() == Some("meta.k8s.io/__internal")
        && reader.read_string("kind").as_deref() == Some("DeleteOptions")
}
