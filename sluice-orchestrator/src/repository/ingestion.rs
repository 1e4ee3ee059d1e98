//! Ingestion Repository
//!
//! Bounded history of ingestion invocations.

use sluice_core::domain::ingestion::IngestionRecord;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Keeps the most recent ingestion records, evicting the oldest
pub struct IngestionHistory {
    capacity: usize,
    records: Mutex<VecDeque<IngestionRecord>>,
}

impl IngestionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Inserts a record or replaces the one with the same id
    pub fn record(&self, record: &IngestionRecord) {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
            return;
        }
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<IngestionRecord> {
        let records = self.records.lock().unwrap();
        records.iter().find(|r| r.id == id).cloned()
    }

    /// Records, newest first
    pub fn list(&self) -> Vec<IngestionRecord> {
        let records = self.records.lock().unwrap();
        records.iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::domain::ingestion::{IngestionOutcome, IngestionTrigger};

    #[test]
    fn test_record_updates_in_place() {
        let history = IngestionHistory::new(5);
        let mut record = IngestionRecord::start(IngestionTrigger::Manual);
        history.record(&record);

        record.finish(IngestionOutcome::Failed {
            reason: "timeout".to_string(),
        });
        history.record(&record);

        assert_eq!(history.list().len(), 1);
        assert!(matches!(
            history.find_by_id(record.id).unwrap().outcome,
            IngestionOutcome::Failed { .. }
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let history = IngestionHistory::new(2);
        let records: Vec<_> = (0..3)
            .map(|_| IngestionRecord::start(IngestionTrigger::Schedule))
            .collect();
        for record in &records {
            history.record(record);
        }

        let listed = history.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, records[2].id);
        assert!(history.find_by_id(records[0].id).is_none());
    }
}
