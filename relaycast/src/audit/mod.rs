//! Durable audit trail of dispatches and issued reply ids.
//!
//! The router records every dispatch, first attempts and retries
//! alike, before it resolves the recipient, plus one row per issued
//! reply id. Writes are fire-and-forget: a failing store is logged and
//! never blocks, retries, or alters a dispatch outcome. The router has
//! no read path; the query methods on [`InMemoryAuditStore`] exist for
//! inspection and tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::types::{InboxId, MessageId, Payload, ReplyId};

pub use memory::InMemoryAuditStore;

/// Immutable snapshot of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Unique id of the message being dispatched.
    pub message_id: MessageId,
    /// Originating handler, if any.
    pub sender: Option<InboxId>,
    /// Normalized recipient name.
    pub recipient: String,
    /// Application data at dispatch time.
    pub payload: Payload,
    /// `None` for a first dispatch, `Some(n)` for the n-th retry.
    pub attempt: Option<u32>,
}

/// Immutable snapshot of an issued reply id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyIssued {
    /// The minted correlation token.
    pub reply_id: ReplyId,
    /// Normalized recipient name of the dispatch that minted it.
    pub recipient: String,
    /// Sender of the dispatch, if any.
    pub sender: Option<InboxId>,
}

/// Append-only store for audit records.
///
/// Implementations must treat records as write-only at runtime: the
/// router never reads them back.
#[async_trait(?Send)]
pub trait AuditStore {
    /// Append a dispatch snapshot.
    async fn record_dispatch(&self, record: DispatchRecord) -> Result<(), AuditError>;

    /// Append an issued-reply snapshot.
    async fn record_reply_issued(&self, record: ReplyIssued) -> Result<(), AuditError>;
}

#[async_trait(?Send)]
impl<A: AuditStore> AuditStore for std::rc::Rc<A> {
    async fn record_dispatch(&self, record: DispatchRecord) -> Result<(), AuditError> {
        (**self).record_dispatch(record).await
    }

    async fn record_reply_issued(&self, record: ReplyIssued) -> Result<(), AuditError> {
        (**self).record_reply_issued(record).await
    }
}
