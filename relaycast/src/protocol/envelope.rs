//! Envelope enums for the proxy ⇄ router channel pair.
//!
//! The two tasks are joined by a pair of unbounded in-memory channels,
//! one per direction, each preserving per-sender FIFO order. There is no
//! global cross-direction total order; anything that needs a handshake
//! (readiness, compaction) is an explicit envelope exchange.
//!
//! ```text
//!   Proxy ──ProxyEvent──▶ Router     (register, send, reply, ...)
//!   Proxy ◀─RouterEvent── Router     (ready, deliveries, pings, ...)
//! ```
//!
//! Both enums are matched exhaustively on the receiving side, so adding
//! a variant is a compile-visible protocol change.

use serde::{Deserialize, Serialize};

use crate::types::{Address, InboxId, MessageId, Payload, ReplyId};

/// A single old→new slot move computed by the proxy during compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMove {
    /// Slot occupied before compaction.
    pub old: Address,
    /// Slot occupied after compaction.
    pub new: Address,
}

/// Envelopes sent by the proxy to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProxyEvent {
    /// A handler was registered under `name` at `address`.
    ///
    /// The id is minted by the proxy so `register_handler` can return it
    /// synchronously; the directory stores it verbatim.
    Register {
        /// Raw handler name; the directory normalizes it.
        name: String,
        /// Slot in the proxy's handler table.
        address: Address,
        /// Stable handler id.
        id: InboxId,
    },

    /// The handler at `address` was disconnected.
    ///
    /// The slot is reclaimed later, by compaction, not here.
    Deregister {
        /// Slot of the disconnected handler.
        address: Address,
    },

    /// The proxy finished compacting its handler table.
    ///
    /// Addresses absent from `moves` belonged to disconnected handlers
    /// and must be dropped by the router. Sent in response to
    /// [`RouterEvent::CleanupRequest`], bypassing the outbound buffer.
    Compacted {
        /// Full old→new mapping of surviving slots.
        moves: Vec<AddressMove>,
    },

    /// Publish a payload to every handler registered under a name.
    Send {
        /// Target handler name.
        recipient: String,
        /// Application data.
        payload: Payload,
        /// Sending handler, if any; recorded for reply correlation.
        sender: Option<InboxId>,
        /// Unique id of this dispatch.
        message_id: MessageId,
        /// Attempt budget; `None` retries forever.
        max_attempts: Option<u32>,
    },

    /// Route a payload back along an earlier dispatch.
    Reply {
        /// Correlation token from the original delivery.
        reply_id: ReplyId,
        /// Application data.
        payload: Payload,
        /// The replying handler, if any; excluded from broadcast replies.
        sender: Option<InboxId>,
        /// Unique id of this dispatch.
        message_id: MessageId,
        /// Attempt budget for the sender leg; `None` retries forever.
        max_attempts: Option<u32>,
        /// Also deliver to every original recipient except the replier.
        reply_all: bool,
    },

    /// Stop the router loop.
    Shutdown,
}

/// Envelopes sent by the router to the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterEvent {
    /// The router is accepting traffic.
    ///
    /// Fires exactly once per router lifetime; the proxy buffers all
    /// outbound envelopes until it arrives.
    Ready,

    /// Deliver a payload to a set of resolved addresses.
    Deliver {
        /// Resolved handler slots, in registration order.
        addresses: Vec<Address>,
        /// Application data.
        payload: Payload,
        /// Correlation token for by-name dispatches; `None` on the
        /// reply path (replies are not themselves replyable).
        reply_id: Option<ReplyId>,
    },

    /// Ask the proxy to compact its handler table.
    CleanupRequest,

    /// The router adopted the proxy's compaction mapping.
    ///
    /// Re-enables outbound traffic paused by the compaction handshake.
    CompactionComplete,

    /// Periodic keepalive for hosts that suspend idle background work.
    Ping,
}
