//! Per-contract transaction ledger — a bounded sliding window of validated
//! transactions, consumed by drift analysis.

use chrono::{DateTime, Utc};
use intentgate_core::TransactionRecord;
use std::collections::VecDeque;

/// Maximum records retained per contract. Oldest entries are evicted first.
pub const LEDGER_CAPACITY: usize = 100;

/// Bounded FIFO sequence of transaction records for one contract.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    records: VecDeque<TransactionRecord>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, evicting the oldest once the window is full.
    pub fn push(&mut self, record: TransactionRecord) {
        if self.records.len() == LEDGER_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records with a timestamp strictly after `cutoff`, oldest first.
    pub fn recent_since(&self, cutoff: DateTime<Utc>) -> Vec<TransactionRecord> {
        self.records
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
