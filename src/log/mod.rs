//! Abstract log record with attachable typed field-set views (spec §3,
//! design note in §9: "Field sets on a log form a capability set").
//!
//! A [`Log`] always carries the `common` field set; `kubernetes-audit` is
//! attached separately so the log model stays generic (other field sets
//! could be added later without touching callers that only need `common`).

mod fields;

pub use fields::{is_internal_delete_options, is_v1_status, AuditFields, CommonFields, Severity};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::InspectionError;
use crate::node::StructuredNode;

/// Capability-set key for a field set attached to a [`Log`] (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSetKind {
    Common,
    KubernetesAudit,
}

#[derive(Debug, Clone)]
enum FieldSetValue {
    Common(CommonFields),
    KubernetesAudit(AuditFields),
}

/// An immutable log record: a decoded body plus a map of attached field
/// sets (spec §3). Readers declare the capability (field set) they need via
/// [`Log::common`] / [`Log::audit`] / [`Log::require_audit`].
#[derive(Debug, Clone)]
pub struct Log {
    /// Monotonic sequence number assigned at ingestion, used as the
    /// insertion-order tie-break for equal timestamps (spec §5).
    pub sequence: u64,
    /// The raw decoded log body (e.g. the full audit event document).
    pub body: StructuredNode,
    field_sets: HashMap<FieldSetKind, FieldSetValue>,
}

impl Log {
    pub fn new(sequence: u64, body: StructuredNode, common: CommonFields) -> Self {
        let mut field_sets = HashMap::new();
        field_sets.insert(FieldSetKind::Common, FieldSetValue::Common(common));
        Self {
            sequence,
            body,
            field_sets,
        }
    }

    pub fn with_audit(mut self, audit: AuditFields) -> Self {
        self.field_sets
            .insert(FieldSetKind::KubernetesAudit, FieldSetValue::KubernetesAudit(audit));
        self
    }

    pub fn has(&self, kind: FieldSetKind) -> bool {
        self.field_sets.contains_key(&kind)
    }

    /// The `common` field set. Always present: [`Log::new`] requires it.
    pub fn common(&self) -> &CommonFields {
        match self.field_sets.get(&FieldSetKind::Common) {
            Some(FieldSetValue::Common(c)) => c,
            _ => unreachable!("Log::new always attaches the common field set"),
        }
    }

    /// The `kubernetes-audit` field set, if attached.
    pub fn audit(&self) -> Option<&AuditFields> {
        match self.field_sets.get(&FieldSetKind::KubernetesAudit) {
            Some(FieldSetValue::KubernetesAudit(a)) => Some(a),
            _ => None,
        }
    }

    /// The `kubernetes-audit` field set, or a `MalformedLog` error if absent
    /// (spec §7: "missing required field set; fatal per log at read time").
    pub fn require_audit(&self) -> Result<&AuditFields, InspectionError> {
        self.audit().ok_or(InspectionError::MalformedLog {
            field_set: "kubernetes-audit",
        })
    }
}

/// A shareable, immutable log list as produced by a provider task (spec §6
/// "Input").
pub type LogList = Vec<Arc<Log>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::StructuredNode;
    use chrono::Utc;

    fn sample_common() -> CommonFields {
        CommonFields {
            timestamp: Utc::now(),
            severity: Severity::Info,
        }
    }

    #[test]
    fn common_always_present() {
        let log = Log::new(0, StructuredNode::null(), sample_common());
        assert_eq!(log.common().severity, Severity::Info);
    }

    #[test]
    fn audit_absent_until_attached() {
        let log = Log::new(0, StructuredNode::null(), sample_common());
        assert!(log.audit().is_none());
        assert!(log.require_audit().is_err());
    }

    #[test]
    fn audit_present_after_with_audit() {
        let log = Log::new(0, StructuredNode::null(), sample_common()).with_audit(AuditFields {
            operation: crate::resource::KubernetesObjectOperation {
                verb: crate::resource::Verb::Create,
                api_version: "core/v1".into(),
                plural_kind: "pods".into(),
                namespace: "default".into(),
                name: "nginx".into(),
                subresource_name: None,
            },
            principal: "system:admin".into(),
            request_uri: "/api/v1/namespaces/default/pods".into(),
            status_code: Some(201),
            status_message: None,
            is_error: false,
            request_body: None,
            response_body: None,
        });
        assert!(log.require_audit().is_ok());
    }
}
