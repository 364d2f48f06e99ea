use std::sync::Arc;

use super::identity::ResourceIdentity;
use crate::log::Log;
use crate::node::StructuredNode;

/// `eventType ∈ {Source|Target}×{Creation, Modification, Deletion}` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventType {
    SourceCreation,
    SourceModification,
    SourceDeletion,
    TargetCreation,
    TargetModification,
    TargetDeletion,
}

impl ResourceEventType {
    pub fn source(resource_created: bool, resource_deleted: bool) -> Self {
        if resource_created {
            Self::SourceCreation
        } else if resource_deleted {
            Self::SourceDeletion
        } else {
            Self::SourceModification
        }
    }

    pub fn target(resource_created: bool, resource_deleted: bool) -> Self {
        if resource_created {
            Self::TargetCreation
        } else if resource_deleted {
            Self::TargetDeletion
        } else {
            Self::TargetModification
        }
    }

    pub fn is_source(self) -> bool {
        matches!(
            self,
            Self::SourceCreation | Self::SourceModification | Self::SourceDeletion
        )
    }

    pub fn is_target(self) -> bool {
        !self.is_source()
    }

    pub fn is_creation(self) -> bool {
        matches!(self, Self::SourceCreation | Self::TargetCreation)
    }

    pub fn is_deletion(self) -> bool {
        matches!(self, Self::SourceDeletion | Self::TargetDeletion)
    }
}

/// A manifest body plus its serialized form, as carried by a `ResourceChangeEvent`.
#[derive(Debug, Clone)]
pub struct ResourceBody {
    pub yaml: String,
    pub reader: StructuredNode,
}

impl ResourceBody {
    pub fn new(node: StructuredNode) -> Self {
        Self {
            yaml: node.to_yaml_string(),
            reader: node,
        }
    }
}

/// One merged-stream step emitted while walking a source/target pair (spec §3, §4.7).
///
/// Carries the most recent body snapshot of *both* sides regardless of which
/// side produced this event, so a modifier's `Process` callback always sees
/// both manifests as they stood at this instant.
#[derive(Debug, Clone)]
pub struct ResourceChangeEvent {
    pub event_type: ResourceEventType,
    pub log: Arc<Log>,
    pub source_resource: Option<ResourceIdentity>,
    pub target_resource: Option<ResourceIdentity>,
    pub source_body: Option<ResourceBody>,
    pub target_body: Option<ResourceBody>,
}

impl ResourceChangeEvent {
    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.log.common().timestamp
    }
}
