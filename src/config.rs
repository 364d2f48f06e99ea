//! Run configuration (spec §6 "Configuration (enumerated)").
//!
//! Loadable from an optional TOML file; every field falls back to the
//! literal default named in the spec when the file is absent or a key is
//! omitted.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::grouper::SubresourceDefaultBehavior;

/// `GraphResolver.MaxIteration` — fail after this many unstable rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// `ResourceRevisionHistoryModifier.minimumDeltaTimeToCreateInferredCreationRevision`.
pub const DEFAULT_RESOURCE_REVISION_INFERRED_DELTA: Duration = Duration::from_secs(5);

/// `ConditionHistoryModifier.minimumDeltaTimeToCreateInferredCreationRevision`.
pub const DEFAULT_CONDITION_INFERRED_DELTA: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// `GraphResolver.MaxIteration`.
    pub max_resolver_iterations: usize,

    /// `ResourceRevisionHistoryModifier.minimumDeltaTimeToCreateInferredCreationRevision`, in seconds.
    pub resource_revision_inferred_delta_secs: u64,

    /// `ConditionHistoryModifier.minimumDeltaTimeToCreateInferredCreationRevision`, in seconds.
    pub condition_inferred_delta_secs: u64,

    /// `LifetimeTracker.kindsToWaitExactDeletion`, default `{core/v1#pod}`.
    pub kinds_to_wait_exact_deletion: BTreeSet<String>,

    /// `ChangeTargetGrouper.subresourceDefaultBehavior` overrides, default `{status → Parent}`.
    pub subresource_default_behavior: SubresourceDefaultBehavior,

    /// `NonSuccessModifier.subresourceMapToWriteToParent`, default `{status, finalize, approve}`.
    pub non_success_subresources_to_parent: BTreeSet<String>,

    /// `OwnerReferenceModifier.nonNamespacedOwnerTypes`, default `{core/v1#node}`.
    pub owner_reference_non_namespaced_types: BTreeSet<String>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            max_resolver_iterations: DEFAULT_MAX_ITERATIONS,
            resource_revision_inferred_delta_secs: DEFAULT_RESOURCE_REVISION_INFERRED_DELTA
                .as_secs(),
            condition_inferred_delta_secs: DEFAULT_CONDITION_INFERRED_DELTA.as_secs(),
            kinds_to_wait_exact_deletion: BTreeSet::from(["core/v1#pod".to_string()]),
            subresource_default_behavior: SubresourceDefaultBehavior::default(),
            non_success_subresources_to_parent: BTreeSet::from([
                "status".to_string(),
                "finalize".to_string(),
                "approve".to_string(),
            ]),
            owner_reference_non_namespaced_types: BTreeSet::from(["core/v1#node".to_string()]),
        }
    }
}

impl InspectionConfig {
    /// Load from a TOML file, falling back to defaults for any missing key.
    /// Returns `Ok(default())` if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn resource_revision_inferred_delta(&self) -> Duration {
        Duration::from_secs(self.resource_revision_inferred_delta_secs)
    }

    pub fn condition_inferred_delta(&self) -> Duration {
        Duration::from_secs(self.condition_inferred_delta_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = InspectionConfig::default();
        assert_eq!(cfg.max_resolver_iterations, 100);
        assert_eq!(cfg.resource_revision_inferred_delta().as_secs(), 5);
        assert_eq!(cfg.condition_inferred_delta().as_secs(), 10);
        assert!(cfg
            .kinds_to_wait_exact_deletion
            .contains("core/v1#pod"));
        assert!(cfg
            .non_success_subresources_to_parent
            .contains("status"));
        assert!(cfg
            .owner_reference_non_namespaced_types
            .contains("core/v1#node"));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let cfg = InspectionConfig::load(Path::new("/nonexistent/kuberift-inspect.toml")).unwrap();
        assert_eq!(cfg.max_resolver_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_resolver_iterations = 50\n").unwrap();
        let cfg = InspectionConfig::load(&path).unwrap();
        assert_eq!(cfg.max_resolver_iterations, 50);
        assert_eq!(cfg.condition_inferred_delta().as_secs(), 10);
    }
}
