//! Generic filter-by-predicate primitive (spec §2 "Filter / Sort / Group
//! primitives").

use crate::log::{Log, LogList};

pub fn filter_logs<F>(logs: &LogList, predicate: F) -> LogList
where
    F: Fn(&Log) -> bool,
{
    logs.iter().filter(|log| predicate(log)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommonFields, Severity};
    use crate::node::StructuredNode;
    use chrono::Utc;
    use std::sync::Arc;

    fn log_with_severity(severity: Severity) -> Arc<Log> {
        Arc::new(Log::new(
            0,
            StructuredNode::null(),
            CommonFields {
                timestamp: Utc::now(),
                severity,
            },
        ))
    }

    #[test]
    fn filter_keeps_only_matching() {
        let logs = vec![log_with_severity(Severity::Info), log_with_severity(Severity::Error)];
        let errors = filter_logs(&logs, |log| log.common().severity == Severity::Error);
        assert_eq!(errors.len(), 1);
    }
}
