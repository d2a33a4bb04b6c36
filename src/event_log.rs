// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Cluster Mesh Simulation Suite - Event Log

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::clock::SimTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogCategory {
    Topology,
    Discovery,
    Routing,
    Forwarding,
    Clock,
    /// Invalid command, topology unchanged.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic, survives eviction.
    pub seq: u64,
    pub tick: u64,
    pub time_ms: u64,
    pub category: LogCategory,
    pub message: String,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only narration of state changes, mirrored to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
    capacity: Option<usize>,
}

impl EventLog {
    pub fn new(capacity: Option<usize>) -> Self {
        Self { entries: VecDeque::new(), next_seq: 0, capacity }
    }

    pub fn record(&mut self, now: SimTime, category: LogCategory, message: impl Into<String>) {
        let message = message.into();
        match category {
            LogCategory::Rejected => {
                tracing::warn!(tick = now.tick, time_ms = now.time_ms, "{}", message)
            }
            _ => tracing::debug!(
                tick = now.tick,
                time_ms = now.time_ms,
                category = ?category,
                "{}",
                message
            ),
        }

        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            tick: now.tick,
            time_ms: now.time_ms,
            category,
            message,
        });
        self.next_seq += 1;

        if let Some(cap) = self.capacity {
            while self.entries.len() > cap {
                self.entries.pop_front();
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries with `seq >= from`, for incremental consumers.
    pub fn since(&self, from: u64) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.seq >= from)
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Sequence number the next entry will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, category: LogCategory) -> usize {
        self.entries.iter().filter(|e| e.category == category).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(tick: u64) -> SimTime {
        SimTime { tick, time_ms: tick * 1000 }
    }

    #[test]
    fn test_entries_are_stamped_and_sequenced() {
        let mut log = EventLog::default();
        log.record(at(0), LogCategory::Topology, "cluster A created");
        log.record(at(2), LogCategory::Routing, "route installed");

        let entries: Vec<&LogEntry> = log.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 0);
        assert_eq!(entries[1].seq, 1);
        assert_eq!(entries[1].tick, 2);
        assert_eq!(entries[1].time_ms, 2000);
        assert_eq!(log.count(LogCategory::Routing), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_but_keeps_seq() {
        let mut log = EventLog::new(Some(2));
        for i in 0..5 {
            log.record(at(i), LogCategory::Clock, format!("tick {i}"));
        }
        assert_eq!(log.len(), 2);
        let seqs: Vec<u64> = log.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert_eq!(log.next_seq(), 5);
    }

    #[test]
    fn test_since_filters_by_seq() {
        let mut log = EventLog::default();
        for i in 0..4 {
            log.record(at(i), LogCategory::Forwarding, format!("event {i}"));
        }
        let tail: Vec<&str> = log.since(2).map(|e| e.message.as_str()).collect();
        assert_eq!(tail, vec!["event 2", "event 3"]);
        assert_eq!(log.since(10).count(), 0);
    }
}
