use std::collections::VecDeque;

use modelstore_core::VersionRecord;

/// Bounded log of the versions a resource has been published at.
pub struct VersionHistory {
    entries: VecDeque<VersionRecord>,
    max_depth: usize,
}

impl VersionHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth,
        }
    }

    pub fn push(&mut self, record: VersionRecord) {
        self.entries.push_back(record);
        // Enforce depth limit by dropping oldest entry
        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&VersionRecord> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<VersionRecord> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelstore_core::{Etag, ResourceKind, Value};

    fn record(seq: u64) -> VersionRecord {
        VersionRecord {
            etag: Etag::compute(seq, ResourceKind::Model, &Value::Integer(seq as i64)).unwrap(),
            audit: None,
        }
    }

    #[test]
    fn oldest_entries_dropped_past_depth() {
        let mut history = VersionHistory::new(3);
        for seq in 1..=5 {
            history.push(record(seq));
        }
        assert_eq!(history.len(), 3);
        let seqs: Vec<u64> = history.to_vec().iter().map(|r| r.etag.sequence()).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert_eq!(history.latest().map(|r| r.etag.sequence()), Some(5));
    }

    #[test]
    fn zero_depth_retains_nothing() {
        let mut history = VersionHistory::new(0);
        history.push(record(1));
        assert!(history.is_empty());
    }
}
