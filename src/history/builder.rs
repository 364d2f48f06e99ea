use std::collections::HashMap;
use std::sync::Mutex;

use crate::log::Severity;
use crate::resource::StagingResourceRevision;

use super::change_set::{ChangeSet, Event};

/// A single resource path's accumulated history (spec §3 "Timeline").
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub revisions: Vec<StagingResourceRevision>,
    pub events: Vec<Event>,
}

impl Timeline {
    /// Stable time-sort of `revisions` and `events` (spec §3 invariant:
    /// "after `Sort()`, revisions within a timeline are non-strictly
    /// time-ordered"). Stable so ties keep their flush/insertion order,
    /// matching the deterministic-given-input-set guarantee of spec §5.
    fn sort(&mut self) {
        self.revisions.sort_by_key(|r| r.change_time);
        self.events.sort_by_key(|e| e.time);
    }
}

#[derive(Debug, Default)]
struct LogSummary {
    text: String,
    severity: Option<Severity>,
}

/// Process-wide aggregator owning every resource path's [`Timeline`] (spec
/// §3, §5). One `HistoryBuilder` lives for the duration of a single
/// inspection run.
///
/// Concurrency: a single mutex guards the whole timeline map (spec §5: "the
/// HistoryBuilder owns a mutex around its per-path timeline map and around
/// each timeline's append"). Modifier pairs run concurrently and each holds
/// the lock only for the duration of a flush or a sort, never across an
/// await point.
#[derive(Debug, Default)]
pub struct HistoryBuilder {
    timelines: Mutex<HashMap<String, Timeline>>,
    aliases: Mutex<HashMap<String, Vec<String>>>,
    log_summaries: Mutex<HashMap<u64, LogSummary>>,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one log's [`ChangeSet`] into the run-wide state.
    pub fn flush(&self, change_set: ChangeSet) {
        let sequence = change_set.sequence;
        let (revisions, events, aliases, log_summary, severity_override) = change_set.into_parts();

        {
            let mut timelines = self.timelines.lock().expect("HistoryBuilder timeline mutex poisoned");
            for (path, revs) in revisions {
                timelines.entry(path).or_default().revisions.extend(revs);
            }
            for (path, evts) in events {
                timelines.entry(path).or_default().events.extend(evts);
            }
        }

        if !aliases.is_empty() {
            let mut alias_graph = self.aliases.lock().expect("HistoryBuilder alias mutex poisoned");
            for (from, to) in aliases {
                alias_graph.entry(from).or_default().extend(to);
            }
        }

        if log_summary.is_some() || severity_override.is_some() {
            let mut summaries = self.log_summaries.lock().expect("HistoryBuilder log summary mutex poisoned");
            let entry = summaries.entry(sequence).or_default();
            if let Some(text) = log_summary {
                entry.text = text;
            }
            if let Some(severity) = severity_override {
                entry.severity = Some(severity);
            }
        }
    }

    /// Sort one resource path's timeline (spec §4.7: called once per path
    /// after a pair's passes finish). A no-op if the path was never
    /// touched.
    pub fn sort_path(&self, path: &str) {
        let mut timelines = self.timelines.lock().expect("HistoryBuilder timeline mutex poisoned");
        if let Some(timeline) = timelines.get_mut(path) {
            timeline.sort();
        }
    }

    /// Snapshot of every timeline built so far.
    pub fn timelines(&self) -> HashMap<String, Timeline> {
        self.timelines.lock().expect("HistoryBuilder timeline mutex poisoned").clone()
    }

    /// The alias graph consumers use to render cross-references (spec §6
    /// Output).
    pub fn alias_graph(&self) -> HashMap<String, Vec<String>> {
        self.aliases.lock().expect("HistoryBuilder alias mutex poisoned").clone()
    }

    /// The log-summary mapper's output for one log sequence number, if any
    /// modifier set one (spec §4.8 "Log-summary mapper").
    pub fn log_summary(&self, sequence: u64) -> Option<(String, Option<Severity>)> {
        self.log_summaries
            .lock()
            .expect("HistoryBuilder log summary mutex poisoned")
            .get(&sequence)
            .map(|s| (s.text.clone(), s.severity))
    }
}
