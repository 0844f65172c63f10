//! Bounded log of sync items that exhausted their attempts.

use std::collections::VecDeque;

use chrono::Utc;
use fieldsync_core::{SyncItem, Tombstone};

/// Oldest entries are evicted first once `limit` is reached.
#[derive(Debug, Clone)]
pub struct TombstoneLog {
    entries: VecDeque<Tombstone>,
    limit: usize,
}

impl TombstoneLog {
    pub fn new(limit: usize) -> Self {
        TombstoneLog {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Rebuilds a log from a checkpoint, keeping the newest `limit` entries.
    pub fn from_entries(entries: Vec<Tombstone>, limit: usize) -> Self {
        let mut log = TombstoneLog::new(limit);
        for entry in entries {
            log.push(entry);
        }
        log
    }

    /// Records `item` as permanently failed and returns the new entry.
    pub fn bury(&mut self, item: SyncItem, last_error: impl Into<String>) -> Tombstone {
        let tombstone = Tombstone {
            item,
            failed_at: Utc::now(),
            last_error: last_error.into(),
        };
        self.push(tombstone.clone());
        tombstone
    }

    fn push(&mut self, tombstone: Tombstone) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(tombstone);
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<Tombstone> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::{GeoPoint, NewMapPin, SyncPayload};

    fn item(description: &str) -> SyncItem {
        let pin = NewMapPin {
            location: GeoPoint { lat: 0.0, lng: 0.0 },
            description: description.to_string(),
            media: vec![],
            is_urgent: false,
        }
        .into_pin();
        SyncItem::new(SyncPayload::PinSave(pin), 1, 3)
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut log = TombstoneLog::new(2);
        let first = log.bury(item("a"), "e1");
        log.bury(item("b"), "e2");
        log.bury(item("c"), "e3");

        let entries = log.list();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|t| t.item.id != first.item.id));
        assert_eq!(entries[1].last_error, "e3");
    }

    #[test]
    fn test_restore_truncates_to_limit() {
        let mut big = TombstoneLog::new(10);
        for i in 0..5 {
            big.bury(item(&i.to_string()), format!("e{}", i));
        }

        let restored = TombstoneLog::from_entries(big.list(), 3);
        let errors: Vec<_> = restored.list().into_iter().map(|t| t.last_error).collect();
        assert_eq!(errors, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut log = TombstoneLog::new(0);
        log.bury(item("a"), "e");
        assert!(log.is_empty());
    }
}
