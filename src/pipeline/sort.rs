//! Generic sort-by-timestamp primitive (spec §2 "Filter / Sort / Group
//! primitives"; spec §5: "ties in timestamp are broken by insertion
//! order").

use crate::log::LogList;

pub fn sort_by_timestamp(logs: &mut LogList) {
    logs.sort_by_key(|log| (log.common().timestamp, log.sequence));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommonFields, Log, Severity};
    use crate::node::StructuredNode;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[test]
    fn sorts_ascending_by_timestamp() {
        let base = Utc::now();
        let mut logs = vec![
            Arc::new(Log::new(0, StructuredNode::null(), CommonFields { timestamp: base + Duration::seconds(2), severity: Severity::Info })),
            Arc::new(Log::new(1, StructuredNode::null(), CommonFields { timestamp: base, severity: Severity::Info })),
            Arc::new(Log::new(2, StructuredNode::null(), CommonFields { timestamp: base + Duration::seconds(1), severity: Severity::Info })),
        ];
        sort_by_timestamp(&mut logs);
        let sequences: Vec<u64> = logs.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 0]);
    }

    #[test]
    fn ties_broken_by_sequence() {
        let base = Utc::now();
        let mut logs = vec![
            Arc::new(Log::new(5, StructuredNode::null(), CommonFields { timestamp: base, severity: Severity::Info })),
            Arc::new(Log::new(3, StructuredNode::null(), CommonFields { timestamp: base, severity: Severity::Info })),
        ];
        sort_by_timestamp(&mut logs);
        let sequences: Vec<u64> = logs.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![3, 5]);
    }
}
