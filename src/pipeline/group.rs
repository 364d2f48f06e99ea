//! Generic group-by-key primitive (spec §2 "Filter / Sort / Group
//! primitives").

use std::collections::HashMap;
use std::hash::Hash;

use crate::log::{Log, LogList};

/// Group logs by a caller-supplied key function, preserving each group's
/// relative log order.
pub fn group_by<K, F>(logs: &LogList, key_of: F) -> HashMap<K, LogList>
where
    K: Eq + Hash,
    F: Fn(&Log) -> K,
{
    let mut groups: HashMap<K, LogList> = HashMap::new();
    for log in logs {
        groups.entry(key_of(log)).or_default().push(log.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommonFields, Severity};
    use crate::node::StructuredNode;
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn groups_preserve_relative_order() {
        let logs: LogList = (0..4)
            .map(|i| {
                Arc::new(Log::new(
                    i,
                    StructuredNode::null(),
                    CommonFields {
                        timestamp: Utc::now(),
                        severity: Severity::Info,
                    },
                ))
            })
            .collect();
        let groups = group_by(&logs, |log| log.sequence % 2);
        assert_eq!(groups[&0].iter().map(|l| l.sequence).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(groups[&1].iter().map(|l| l.sequence).collect::<Vec<_>>(), vec![1, 3]);
    }
}
