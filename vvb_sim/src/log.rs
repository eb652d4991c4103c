//! Bounded ring log of delivered broadcasts.
//!
//! The bus records every non-dropped broadcast in emission order.
//! Capacity is fixed; the oldest record is evicted once full. Each
//! record carries a strictly monotone sequence number so reporting
//! tools can detect eviction gaps.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use vvb_common::msg::{Message, MsgId};

/// Maximum number of retained records.
pub const BUS_LOG_CAPACITY: usize = 1000;

/// One logged broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Append index, strictly monotone across the run.
    pub seq: u64,
    /// The delivered message (post fault transformation).
    pub msg: Message,
}

/// Append-only bounded FIFO of bus traffic.
#[derive(Debug, Default)]
pub struct MessageLog {
    records: VecDeque<LogRecord>,
    next_seq: u64,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            records: VecDeque::with_capacity(BUS_LOG_CAPACITY),
            next_seq: 0,
        }
    }

    /// Append a message, evicting the oldest record past capacity.
    /// Returns the assigned sequence number.
    pub(crate) fn append(&mut self, msg: Message) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.records.len() == BUS_LOG_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(LogRecord { seq, msg });
        seq
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of messages ever appended, including evicted ones.
    pub fn appended(&self) -> u64 {
        self.next_seq
    }

    /// Iterate retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    /// Iterate retained messages with the given id, oldest first.
    pub fn messages(&self, id: MsgId) -> impl Iterator<Item = &Message> {
        self.records
            .iter()
            .filter(move |r| r.msg.id == id)
            .map(|r| &r.msg)
    }

    /// Most recent retained message with the given id.
    pub fn last(&self, id: MsgId) -> Option<&Message> {
        self.records.iter().rev().find(|r| r.msg.id == id).map(|r| &r.msg)
    }

    /// Owned snapshot of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records.iter().cloned().collect()
    }
}
