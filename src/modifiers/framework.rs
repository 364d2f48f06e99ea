//! `ManifestHistoryModifier` framework (spec §4.7): walks paired
//! *source*/*target* per-resource log streams in chronological order,
//! invoking a modifier's multi-pass `process` callback and flushing the
//! resulting `ChangeSet`s into the `HistoryBuilder`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::InspectionError;
use crate::history::{ChangeSet, HistoryBuilder};
use crate::log::Log;
use crate::pipeline::{LifetimeAnnotation, ManifestSnapshot};
use crate::resource::{ResourceBody, ResourceChangeEvent, ResourceEventType, ResourceIdentity};

/// One log from a resource group, already folded through the manifest
/// generator and lifetime tracker (spec §2 data flow).
#[derive(Debug, Clone)]
pub struct AnnotatedLog {
    pub log: Arc<Log>,
    pub manifest: ManifestSnapshot,
    pub annotation: LifetimeAnnotation,
}

/// One resource's chronologically sorted stream of annotated logs, plus the
/// identity it was grouped under (so modifiers don't need to re-parse path
/// strings to build `ResourcePairs`).
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub identity: ResourceIdentity,
    pub logs: Vec<AnnotatedLog>,
}

/// Resource groups keyed by canonical path string.
pub type ResourceGroups = HashMap<String, ResourceGroup>;

/// A (source, target) pair a modifier walks (spec §4.7 "ResourcePairs
/// function"). `source == target` for modifiers that only look at one
/// resource's own history (resource-revision, status-condition, ...).
#[derive(Debug, Clone)]
pub struct ResourcePair {
    pub source: ResourceIdentity,
    pub target: ResourceIdentity,
}

/// A concrete history modifier (spec §4.7, §4.8).
pub trait ManifestHistoryModifier: Send + Sync {
    /// Per-pair state threaded through `process` calls within one pass; does
    /// not cross passes unless the modifier re-seeds it itself.
    type State: Default + Send;

    /// Number of times the framework walks each pair's merged stream.
    fn pass_count(&self) -> usize {
        1
    }

    fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair>;

    fn process(
        &self,
        pass_index: usize,
        event: &ResourceChangeEvent,
        change_set: &mut ChangeSet,
        history_builder: &HistoryBuilder,
        prev_state: Self::State,
    ) -> Self::State;
}

/// Run one modifier over every pair it declares, in parallel up to the
/// available parallelism (spec §4.7: "processed in parallel up to
/// GOMAXPROCS; pairs are independent"). Cancels remaining pairs on the
/// first failure.
pub async fn run_modifier<M>(
    modifier: Arc<M>,
    groups: Arc<ResourceGroups>,
    history_builder: Arc<HistoryBuilder>,
) -> Result<(), InspectionError>
where
    M: ManifestHistoryModifier + 'static,
{
    let pairs = modifier.resource_pairs(&groups);
    let max_parallel = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let semaphore = Arc::new(Semaphore::new(max_parallel));

    let mut join_set = JoinSet::new();
    for pair in pairs {
        let modifier = Arc::clone(&modifier);
        let groups = Arc::clone(&groups);
        let history_builder = Arc::clone(&history_builder);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("modifier framework semaphore never closes");
            process_pair(modifier.as_ref(), &groups, &pair, &history_builder)
        });
    }

    let mut touched_paths: BTreeSet<String> = BTreeSet::new();
    let mut first_error: Option<InspectionError> = None;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(paths)) => touched_paths.extend(paths),
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
                join_set.abort_all();
            }
            Err(join_err) => {
                first_error.get_or_insert(InspectionError::TaskRuntimeFailure {
                    implementation_id: "manifest-history-modifier-pair".to_string(),
                    source: Box::new(join_err),
                });
                join_set.abort_all();
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    for path in touched_paths {
        history_builder.sort_path(&path);
    }
    Ok(())
}

fn process_pair<M>(
    modifier: &M,
    groups: &ResourceGroups,
    pair: &ResourcePair,
    history_builder: &HistoryBuilder,
) -> Result<BTreeSet<String>, InspectionError>
where
    M: ManifestHistoryModifier,
{
    let empty: Vec<AnnotatedLog> = Vec::new();
    let source_logs = groups.get(&pair.source.path()).map(|g| &g.logs).unwrap_or(&empty);
    let target_logs = groups.get(&pair.target.path()).map(|g| &g.logs).unwrap_or(&empty);

    let mut touched = BTreeSet::new();

    for pass_index in 0..modifier.pass_count() {
        let mut state = M::State::default();
        let mut source_body: Option<ResourceBody> = None;
        let mut target_body: Option<ResourceBody> = None;
        let (mut si, mut ti) = (0usize, 0usize);

        while si < source_logs.len() || ti < target_logs.len() {
            let take_source = match (source_logs.get(si), target_logs.get(ti)) {
                (Some(s), Some(t)) => s.log.common().timestamp <= t.log.common().timestamp,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => unreachable!("loop condition guarantees at least one side remains"),
            };

            let annotated = if take_source { &source_logs[si] } else { &target_logs[ti] };
            let mut change_set = ChangeSet::new(annotated.log.sequence);

            if take_source {
                source_body = Some(ResourceBody::new(annotated.manifest.body.clone()));
                si += 1;
            } else {
                target_body = Some(ResourceBody::new(annotated.manifest.body.clone()));
                ti += 1;
            }

            let event_type = if take_source {
                ResourceEventType::source(annotated.annotation.resource_created, annotated.annotation.resource_deleted)
            } else {
                ResourceEventType::target(annotated.annotation.resource_created, annotated.annotation.resource_deleted)
            };

            let event = ResourceChangeEvent {
                event_type,
                log: Arc::clone(&annotated.log),
                source_resource: Some(pair.source.clone()),
                target_resource: Some(pair.target.clone()),
                source_body: source_body.clone(),
                target_body: target_body.clone(),
            };

            state = modifier.process(pass_index, &event, &mut change_set, history_builder, state);
            touched.extend(change_set.touched_paths().map(String::from));
            history_builder.flush(change_set);
        }
    }

    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{AuditFields, CommonFields, Severity};
    use crate::node::StructuredNode;
    use crate::resource::{KubernetesObjectOperation, RevisionState, StagingResourceRevision, Verb};
    use chrono::{Duration, Utc};

    fn log_at(sequence: u64, offset_secs: i64) -> Arc<Log> {
        let operation = KubernetesObjectOperation {
            verb: Verb::Update,
            api_version: "core/v1".into(),
            plural_kind: "pods".into(),
            namespace: "default".into(),
            name: "nginx".into(),
            subresource_name: None,
        };
        Arc::new(
            Log::new(
                sequence,
                StructuredNode::null(),
                CommonFields {
                    timestamp: Utc::now() + Duration::seconds(offset_secs),
                    severity: Severity::Info,
                },
            )
            .with_audit(AuditFields {
                operation,
                principal: "system:admin".into(),
                request_uri: "/api/v1/namespaces/default/pods/nginx".into(),
                status_code: Some(200),
                status_message: None,
                is_error: false,
                request_body: None,
                response_body: None,
            }),
        )
    }

    fn annotated(log: Arc<Log>, created: bool) -> AnnotatedLog {
        AnnotatedLog {
            log,
            manifest: ManifestSnapshot {
                body: StructuredNode::null(),
                partial: false,
            },
            annotation: LifetimeAnnotation {
                resource_created: created,
                resource_deleted: false,
            },
        }
    }

    struct RecordingModifier;

    impl ManifestHistoryModifier for RecordingModifier {
        type State = Vec<u64>;

        fn resource_pairs(&self, groups: &ResourceGroups) -> Vec<ResourcePair> {
            groups
                .keys()
                .map(|_| ResourcePair {
                    source: ResourceIdentity::new("core/v1", "pod", "default", "nginx"),
                    target: ResourceIdentity::new("core/v1", "pod", "default", "nginx"),
                })
                .collect()
        }

        fn process(
            &self,
            _pass_index: usize,
            event: &ResourceChangeEvent,
            change_set: &mut ChangeSet,
            _history_builder: &HistoryBuilder,
            mut prev_state: Self::State,
        ) -> Self::State {
            if event.event_type.is_source() {
                return prev_state;
            }
            prev_state.push(event.log.sequence);
            change_set.add_revision(
                "core/v1#pod#default#nginx",
                StagingResourceRevision::new(Verb::Update, RevisionState::Existing, event.timestamp()),
            );
            prev_state
        }
    }

    #[tokio::test]
    async fn merges_source_and_target_streams_in_timestamp_order() {
        let mut groups = ResourceGroups::new();
        groups.insert(
            "core/v1#pod#default#nginx".to_string(),
            ResourceGroup {
                identity: ResourceIdentity::new("core/v1", "pod", "default", "nginx"),
                logs: vec![
                    annotated(log_at(0, 0), true),
                    annotated(log_at(1, 2), false),
                    annotated(log_at(2, 1), false),
                ],
            },
        );
        let history_builder = Arc::new(HistoryBuilder::new());
        run_modifier(Arc::new(RecordingModifier), Arc::new(groups), Arc::clone(&history_builder))
            .await
            .unwrap();

        let timelines = history_builder.timelines();
        let timeline = &timelines["core/v1#pod#default#nginx"];
        assert_eq!(timeline.revisions.len(), 3);
        // Sort() has run: change_time is non-decreasing even though sequence 1/2 were merged out of order.
        for pair in timeline.revisions.windows(2) {
            assert!(pair[0].change_time <= pair[1].change_time);
        }
    }
}
