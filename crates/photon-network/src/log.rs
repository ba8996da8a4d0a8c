//! Append-only message log

use crate::types::MessageRecord;

/// Accepted messages in acceptance order.
///
/// There is no removal API; the log grows for the lifetime of the service.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    records: Vec<MessageRecord>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its position
    pub fn append(&mut self, record: MessageRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been logged yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned copy of every record, for history replay
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.clone()
    }
}
