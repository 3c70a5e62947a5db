//! In-memory audit store with hash indexes.
//!
//! The persisted layout mirrors the audit requirements: an append-only
//! dispatch log queryable by unique message id and by recipient name,
//! and a reply log keyed by reply id.

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::audit::{AuditStore, DispatchRecord, ReplyIssued};
use crate::error::AuditError;
use crate::types::{MessageId, ReplyId};

#[derive(Debug, Default)]
struct Inner {
    dispatches: Vec<DispatchRecord>,
    replies: Vec<ReplyIssued>,
    by_message: HashMap<MessageId, Vec<usize>>,
    by_recipient: HashMap<String, Vec<usize>>,
    by_reply: HashMap<ReplyId, usize>,
}

/// Append-only in-memory audit store.
///
/// Suitable for single-process deployments and tests. Records are kept
/// in arrival order; the indexes point into the dispatch log.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    inner: RefCell<Inner>,
}

impl InMemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch attempt recorded for a message id, oldest first.
    pub fn dispatches_for_message(&self, message_id: MessageId) -> Vec<DispatchRecord> {
        let inner = self.inner.borrow();
        inner
            .by_message
            .get(&message_id)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&index| inner.dispatches[index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every dispatch attempt recorded for a recipient name, oldest
    /// first.
    pub fn dispatches_for_recipient(&self, recipient: &str) -> Vec<DispatchRecord> {
        let inner = self.inner.borrow();
        inner
            .by_recipient
            .get(recipient)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&index| inner.dispatches[index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The issued-reply row for a reply id, if recorded.
    pub fn reply_issued(&self, reply_id: ReplyId) -> Option<ReplyIssued> {
        let inner = self.inner.borrow();
        inner
            .by_reply
            .get(&reply_id)
            .map(|&index| inner.replies[index].clone())
    }

    /// Total number of dispatch rows.
    pub fn dispatch_count(&self) -> usize {
        self.inner.borrow().dispatches.len()
    }

    /// Total number of issued-reply rows.
    pub fn reply_count(&self) -> usize {
        self.inner.borrow().replies.len()
    }
}

#[async_trait(?Send)]
impl AuditStore for InMemoryAuditStore {
    async fn record_dispatch(&self, record: DispatchRecord) -> Result<(), AuditError> {
        let mut inner = self.inner.borrow_mut();
        let index = inner.dispatches.len();
        inner
            .by_message
            .entry(record.message_id)
            .or_default()
            .push(index);
        inner
            .by_recipient
            .entry(record.recipient.clone())
            .or_default()
            .push(index);
        inner.dispatches.push(record);
        Ok(())
    }

    async fn record_reply_issued(&self, record: ReplyIssued) -> Result<(), AuditError> {
        let mut inner = self.inner.borrow_mut();
        let index = inner.replies.len();
        inner.by_reply.insert(record.reply_id, index);
        inner.replies.push(record);
        Ok(())
    }
}
