use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::types::Event;

/// A delivery that failed inside a subscriber
#[derive(Debug, Clone, Serialize)]
pub struct FailedDelivery {
    pub event: Event,
    pub target_agent: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO of failed deliveries with age-based eviction
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: VecDeque<FailedDelivery>,
    capacity: usize,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, entry: FailedDelivery) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Drop entries whose timestamp is not newer than `now - retention`.
    pub fn evict_older_than(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let before = self.entries.len();
        self.entries.retain(|entry| entry.timestamp > cutoff);
        before - self.entries.len()
    }

    pub fn remove_user(&mut self, user_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.event.user_id != user_id);
        before - self.entries.len()
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<FailedDelivery> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
