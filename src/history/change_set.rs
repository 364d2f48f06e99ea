use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::log::Severity;
use crate::resource::StagingResourceRevision;

/// A point-in-time occurrence tied to a resource path, carrying no state
/// transition (spec glossary "Event").
#[derive(Debug, Clone)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Per-log working set (spec §3): every modifier pass writes revisions,
/// events, and owner-reference aliases here before the
/// `ManifestHistoryModifier` framework flushes it into the
/// [`HistoryBuilder`](super::HistoryBuilder).
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Sequence number of the log this change set was collected for.
    pub sequence: u64,
    revisions: HashMap<String, Vec<StagingResourceRevision>>,
    events: HashMap<String, Vec<Event>>,
    /// Resource path → owner-subresource alias paths it points to (spec
    /// §4.8 "Owner reference").
    aliases: HashMap<String, Vec<String>>,
    pub log_summary: Option<String>,
    pub severity_override: Option<Severity>,
}

impl ChangeSet {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            revisions: HashMap::new(),
            events: HashMap::new(),
            aliases: HashMap::new(),
            log_summary: None,
            severity_override: None,
        }
    }

    pub fn add_revision(&mut self, path: impl Into<String>, revision: StagingResourceRevision) {
        self.revisions.entry(path.into()).or_default().push(revision);
    }

    pub fn add_event(&mut self, path: impl Into<String>, event: Event) {
        self.events.entry(path.into()).or_default().push(event);
    }

    pub fn add_alias(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.aliases.entry(from.into()).or_default().push(to.into());
    }

    pub fn set_log_summary(&mut self, summary: impl Into<String>) {
        self.log_summary = Some(summary.into());
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity_override = Some(severity);
    }

    /// Every resource path this change set touched, for the framework's
    /// post-pass `Sort()` sweep (spec §4.7).
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        self.revisions.keys().chain(self.events.keys()).map(String::as_str)
    }

    pub(super) fn into_parts(
        self,
    ) -> (
        HashMap<String, Vec<StagingResourceRevision>>,
        HashMap<String, Vec<Event>>,
        HashMap<String, Vec<String>>,
        Option<String>,
        Option<Severity>,
    ) {
        (self.revisions, self.events, self.aliases, self.log_summary, self.severity_override)
    }
}
