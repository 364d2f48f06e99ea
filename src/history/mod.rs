//! Per-log collection and process-wide aggregation of revisions and events
//! (spec §3 "ChangeSet & HistoryBuilder", §4.7, §5).
//!
//! Every modifier pass writes into a private [`ChangeSet`] for the log it is
//! currently looking at; the `ManifestHistoryModifier` framework flushes
//! each `ChangeSet` into the run-wide [`HistoryBuilder`] once a pair's passes
//! finish, then sorts the touched paths (spec §4.7: "the framework calls
//! `Sort()` on every resource path touched by the pair's change set").

mod builder;
mod change_set;

pub use builder::{HistoryBuilder, Timeline};
pub use change_set::{ChangeSet, Event};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Severity;
    use crate::resource::{RevisionState, StagingResourceRevision, Verb};
    use chrono::Utc;

    fn revision(state: RevisionState) -> StagingResourceRevision {
        StagingResourceRevision::new(Verb::Create, state, Utc::now()).with_requestor("system:admin")
    }

    #[test]
    fn flush_merges_changeset_into_timeline_and_sorts() {
        let builder = HistoryBuilder::new();
        let path = "core/v1#pod#default#nginx";

        let mut first = ChangeSet::new(0);
        first.add_revision(path, revision(RevisionState::Existing));
        builder.flush(first);

        let mut second = ChangeSet::new(1);
        second.add_revision(path, revision(RevisionState::Deleted));
        second.add_event(
            path,
            Event {
                time: Utc::now(),
                message: "Delete /api/v1/namespaces/default/pods/nginx".to_string(),
                severity: Severity::Info,
            },
        );
        builder.flush(second);

        builder.sort_path(path);
        let timelines = builder.timelines();
        let timeline = timelines.get(path).unwrap();
        assert_eq!(timeline.revisions.len(), 2);
        assert_eq!(timeline.events.len(), 1);
    }

    #[test]
    fn aliases_accumulate_across_flushes() {
        let builder = HistoryBuilder::new();
        let mut change_set = ChangeSet::new(0);
        change_set.add_alias(
            "core/v1#pod#default#nginx",
            "apps/v1#replicaset#default#r1/pod/nginx",
        );
        builder.flush(change_set);
        let aliases = builder.alias_graph();
        assert_eq!(
            aliases.get("core/v1#pod#default#nginx").map(Vec::as_slice),
            Some(&["apps/v1#replicaset#default#r1/pod/nginx".to_string()][..])
        );
    }
}
