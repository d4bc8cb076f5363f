//! Bounded operator log.
//!
//! Keeps the newest `capacity` entries; pushing past capacity evicts the
//! oldest, so a long camera session cannot grow memory without bound.

use std::collections::VecDeque;

use crate::event::LogEntry;

pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug)]
pub struct LogBook {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    evicted: u64,
}

impl LogBook {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    /// Append an entry. Evicts the oldest entries as needed.
    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut book = LogBook::new(3);
        for i in 0..5 {
            book.push(LogEntry::new(format!("line {i}")));
        }
        let messages: Vec<&str> = book.iter().map(|e| e.message()).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(book.len(), 3);
        assert_eq!(book.evicted(), 2);
        assert_eq!(book.latest().map(|e| e.message()), Some("line 4"));
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut book = LogBook::new(0);
        assert_eq!(book.capacity(), 1);
        book.push(LogEntry::new("a"));
        book.push(LogEntry::new("b"));
        assert_eq!(book.len(), 1);
        assert_eq!(book.latest().map(|e| e.message()), Some("b"));
    }

    #[test]
    fn default_capacity() {
        let book = LogBook::default();
        assert!(book.is_empty());
        assert_eq!(book.capacity(), DEFAULT_LOG_CAPACITY);
        assert_eq!(book.evicted(), 0);
    }
}
