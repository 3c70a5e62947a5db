//! FIFO retry queue for messages that failed lookup.
//!
//! One deadline governs the whole queue. It is armed when the first
//! entry arrives, cancelled when the queue empties, and re-armed after
//! a full flush pass if entries remain, like a one-shot timer that the
//! flush reschedules. Entries enqueued while a pass runs are
//! not part of that pass.

use std::collections::VecDeque;
use std::time::Duration;

use crate::router::dispatch::PendingMessage;

/// Ordered queue of messages awaiting re-dispatch.
#[derive(Debug, Default)]
pub struct RetryQueue {
    entries: VecDeque<PendingMessage>,
    /// Next flush time on the provider timeline; `None` while empty.
    deadline: Option<Duration>,
}

impl RetryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a missed message, arming the tick if it was not armed.
    pub fn enqueue(&mut self, message: PendingMessage, now: Duration, interval: Duration) {
        self.entries.push_back(message);
        if self.deadline.is_none() {
            self.deadline = Some(now + interval);
        }
    }

    /// Take the current contents for one flush pass, disarming the
    /// tick. Misses re-enter through [`RetryQueue::enqueue`] and are
    /// picked up next tick.
    pub fn drain_pass(&mut self) -> Vec<PendingMessage> {
        self.deadline = None;
        self.entries.drain(..).collect()
    }

    /// Reschedule after a completed pass: armed only while non-empty.
    pub fn complete_pass(&mut self, now: Duration, interval: Duration) {
        self.deadline = if self.entries.is_empty() {
            None
        } else {
            Some(now + interval)
        };
    }

    /// Next flush time, if armed.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no messages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
