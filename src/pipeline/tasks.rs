//! Task registration and pipeline wiring (spec §2): the built-in
//! provider/filter/sort/group tasks and the nine resource-specific
//! modifiers, assembled into one `TaskGraphResolver` + `TaskRunner` run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;

use crate::config::InspectionConfig;
use crate::error::InspectionError;
use crate::history::HistoryBuilder;
use crate::log::{Log, LogList};
use crate::modifiers::{
    run_modifier, AnnotatedLog, ContainerStateModifier, EndpointSliceModifier,
    LogSummaryModifier, ManifestHistoryModifier, NamespaceRequestEventModifier,
    NonSuccessEventModifier, OwnerReferenceModifier, PodPhaseModifier, ResourceGroup,
    ResourceGroups, ResourceRevisionModifier, StatusConditionModifier,
};
use crate::pipeline::filter::filter_logs;
use crate::pipeline::sort::sort_by_timestamp;
use crate::pipeline::{ChangeTargetGrouper, LifetimeState, ManifestGenerator, ManifestState, ResourceLifetimeTracker};
use crate::resource::ResourceIdentity;
use crate::task::{DynTask, Task, TaskGraphResolver, TaskLabels, TaskReference, TaskRunner};

fn raw_logs_ref() -> TaskReference<LogList> {
    TaskReference::new("raw-logs")
}

fn filtered_logs_ref() -> TaskReference<LogList> {
    TaskReference::new("filtered-logs")
}

fn sorted_logs_ref() -> TaskReference<LogList> {
    TaskReference::new("sorted-logs")
}

fn resource_groups_ref() -> TaskReference<ResourceGroups> {
    TaskReference::new("resource-groups")
}

fn modifier_ref(name: &str) -> TaskReference<()> {
    TaskReference::new(format!("modifier-{name}"))
}

/// Wraps the already-parsed log list handed to [`run_inspection`] — the
/// `[]Log` provider is a pure function of an in-memory slice, not an I/O
/// task.
fn provider_task(logs: LogList) -> Arc<dyn DynTask> {
    Arc::new(
        Task::new("log-provider", raw_logs_ref(), move |ctx| {
            let logs = logs.clone();
            async move {
                if ctx.dry_run {
                    return Ok(LogList::new());
                }
                Ok(logs)
            }
        })
        .with_labels(TaskLabels::required()),
    )
}

/// Drops logs missing the `kubernetes-audit` field set before anything
/// downstream assumes its presence.
fn filter_task() -> Arc<dyn DynTask> {
    Arc::new(
        Task::new("log-filter", filtered_logs_ref(), move |ctx| {
            let raw_ref = raw_logs_ref();
            async move {
                if ctx.dry_run {
                    return Ok(LogList::new());
                }
                let raw = ctx.get(&raw_ref).await?;
                Ok(filter_logs(&raw, |log| log.audit().is_some()))
            }
        })
        .depends_on(&raw_logs_ref().id),
    )
}

fn sort_task() -> Arc<dyn DynTask> {
    Arc::new(
        Task::new("log-sort", sorted_logs_ref(), move |ctx| {
            let filtered_ref = filtered_logs_ref();
            async move {
                if ctx.dry_run {
                    return Ok(LogList::new());
                }
                let filtered = ctx.get(&filtered_ref).await?;
                let mut logs = (*filtered).clone();
                sort_by_timestamp(&mut logs);
                Ok(logs)
            }
        })
        .depends_on(&filtered_logs_ref().id),
    )
}

/// Folds the sorted log stream through [`ChangeTargetGrouper`], then folds
/// each group's own stream through [`ManifestGenerator`] and
/// [`ResourceLifetimeTracker`] to produce the `ResourceGroups` every modifier
/// reads from.
fn build_resource_groups(
    logs: &LogList,
    config: &InspectionConfig,
) -> Result<ResourceGroups, InspectionError> {
    let mut grouper = ChangeTargetGrouper::new(config.subresource_default_behavior.clone());
    let mut per_path: HashMap<String, (ResourceIdentity, Vec<Arc<Log>>)> = HashMap::new();

    for log in logs {
        for target in grouper.group(log)? {
            let path = target.identity.path();
            per_path
                .entry(path)
                .or_insert_with(|| (target.identity, Vec::new()))
                .1
                .push(Arc::clone(log));
        }
    }

    let manifest_generator = ManifestGenerator::kubernetes_defaults();
    let lifetime_tracker = ResourceLifetimeTracker::new(config.kinds_to_wait_exact_deletion.clone());

    let mut groups = ResourceGroups::new();
    for (path, (identity, group_logs)) in per_path {
        let mut manifest_state = ManifestState::default();
        let mut lifetime_state = LifetimeState::default();
        let kind_key = format!("{}#{}", identity.api_version, identity.singular_kind);

        let mut annotated = Vec::with_capacity(group_logs.len());
        for log in &group_logs {
            let manifest = manifest_generator.advance(&mut manifest_state, log, &identity.name, &identity.singular_kind);
            let annotation = lifetime_tracker.advance(&mut lifetime_state, log, &kind_key)?;
            annotated.push(AnnotatedLog {
                log: Arc::clone(log),
                manifest,
                annotation,
            });
        }

        groups.insert(path, ResourceGroup { identity, logs: annotated });
    }

    Ok(groups)
}

fn group_task() -> Arc<dyn DynTask> {
    Arc::new(
        Task::new("resource-group", resource_groups_ref(), move |ctx| {
            let sorted_ref = sorted_logs_ref();
            async move {
                if ctx.dry_run {
                    return Ok(ResourceGroups::new());
                }
                let sorted = ctx.get(&sorted_ref).await?;
                build_resource_groups(&sorted, &ctx.config)
            }
        })
        .depends_on(&sorted_logs_ref().id),
    )
}

/// One task per concrete modifier, each running every resource pair the
/// modifier declares via [`run_modifier`] and publishing `()` once done.
fn modifier_task<M>(name: &'static str, modifier: M) -> Arc<dyn DynTask>
where
    M: ManifestHistoryModifier + 'static,
{
    let modifier = Arc::new(modifier);
    Arc::new(
        Task::new(format!("modifier-{name}"), modifier_ref(name), move |ctx| {
            let groups_ref = resource_groups_ref();
            let modifier = Arc::clone(&modifier);
            async move {
                if ctx.dry_run {
                    return Ok(());
                }
                let groups = ctx.get(&groups_ref).await?;
                run_modifier(modifier, groups, Arc::clone(&ctx.history_builder)).await
            }
        })
        .depends_on(&resource_groups_ref().id)
        .with_labels(TaskLabels::required()),
    )
}

/// Glues the data-flow diagram (raw logs → provider → filter/sort/group →
/// manifest/lifetime fold → nine modifiers) together as one task graph run
/// (spec §2), returning the shared [`HistoryBuilder`] every task wrote into.
pub async fn run_inspection(
    logs: LogList,
    config: InspectionConfig,
    dry_run: bool,
) -> Result<Arc<HistoryBuilder>, InspectionError> {
    let history_builder = Arc::new(HistoryBuilder::new());
    let config = Arc::new(config);

    let revision_delta = ChronoDuration::from_std(config.resource_revision_inferred_delta())
        .unwrap_or_else(|_| ChronoDuration::seconds(5));
    let condition_delta = ChronoDuration::from_std(config.condition_inferred_delta())
        .unwrap_or_else(|_| ChronoDuration::seconds(10));

    let pool: Vec<Arc<dyn DynTask>> = vec![
        provider_task(logs),
        filter_task(),
        sort_task(),
        group_task(),
        modifier_task("resource-revision", ResourceRevisionModifier::new(revision_delta)),
        modifier_task("status-condition", StatusConditionModifier::new(condition_delta)),
        modifier_task("pod-phase", PodPhaseModifier::new(revision_delta)),
        modifier_task("container-state", ContainerStateModifier::new()),
        modifier_task("endpoint-slice", EndpointSliceModifier::new()),
        modifier_task(
            "owner-reference",
            OwnerReferenceModifier::new(config.owner_reference_non_namespaced_types.clone()),
        ),
        modifier_task(
            "non-success-event",
            NonSuccessEventModifier::new(config.non_success_subresources_to_parent.clone()),
        ),
        modifier_task("namespace-request-event", NamespaceRequestEventModifier),
        modifier_task("log-summary", LogSummaryModifier),
    ];

    let resolver = TaskGraphResolver::new(config.max_resolver_iterations);
    let resolved = resolver.resolve(pool)?;
    tracing::info!(task_count = resolved.len(), "resolved inspection task graph");

    let runner = TaskRunner::new(resolved, Arc::clone(&config), Arc::clone(&history_builder), dry_run);
    runner.run().await?;

    Ok(history_builder)
}
