//! Dispatch engine types: pending messages and target resolution.
//!
//! A [`PendingMessage`] is the router's unit of work: a payload plus a
//! target and an attempt budget. First dispatches and retry-queue
//! flushes go through the identical path; the only difference is the
//! attempt counter.

use crate::router::directory::Directory;
use crate::types::{Address, InboxId, MessageId, Payload};

/// What a pending message resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Ordinary publish path: every handler registered under a
    /// normalized name.
    Name(String),

    /// Address-keyed reply path: the stored sender of an earlier
    /// dispatch, referenced by stable id so compaction cannot
    /// invalidate the target.
    Sender {
        /// The original sender being replied to.
        id: InboxId,
        /// Recipient name of the original dispatch, kept for the audit
        /// trail.
        recipient: String,
    },
}

impl DispatchTarget {
    /// Name under which this dispatch is audited and logged.
    pub fn recipient(&self) -> &str {
        match self {
            DispatchTarget::Name(name) => name,
            DispatchTarget::Sender { recipient, .. } => recipient,
        }
    }
}

/// A message travelling through dispatch, possibly via the retry queue.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    /// Unique id of this dispatch; names the message in the audit trail
    /// and in drop logs.
    pub message_id: MessageId,
    /// Resolution target.
    pub target: DispatchTarget,
    /// Application data.
    pub payload: Payload,
    /// Originating handler, if any.
    pub sender: Option<InboxId>,
    /// Attempt budget; `None` means unbounded.
    pub max_attempts: Option<u32>,
    /// Lookups performed so far. Zero before the first dispatch; the
    /// counter never exceeds `max_attempts`.
    pub attempts: u32,
}

impl PendingMessage {
    /// Whether the attempt budget is spent after one more miss.
    ///
    /// The boundary rule: a message whose counter has reached its max
    /// is dropped, not granted one further retry. Unbounded messages
    /// are never exhausted.
    pub fn is_exhausted(&self) -> bool {
        match self.max_attempts {
            Some(max) => self.attempts >= max,
            None => false,
        }
    }
}

/// Resolve a dispatch target against the directory.
///
/// Name targets fan out to every registered address in registration
/// order; sender targets resolve the stable id to its current address.
/// An empty result means "no subscriber" in both cases: a vanished
/// reply target is indistinguishable from an unregistered name, so the
/// retry policy treats them identically.
pub fn resolve(directory: &Directory, target: &DispatchTarget) -> Vec<Address> {
    match target {
        DispatchTarget::Name(name) => directory.lookup(name),
        DispatchTarget::Sender { id, .. } => directory.address_of(*id).into_iter().collect(),
    }
}

/// Clamp an attempt budget to at least one attempt.
///
/// `None` stays unbounded.
pub fn normalize_attempts(max_attempts: Option<u32>) -> Option<u32> {
    max_attempts.map(|max| max.max(1))
}
