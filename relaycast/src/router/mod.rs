//! The routing process: directory, dispatch, retries, correlation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Router (one task, no internal parallelism)   │
//! │                                              │
//! │  ┌────────────┐  ┌────────────┐              │
//! │  │ Directory  │  │ ReplyTable │              │
//! │  │ name→addr  │  │ id→record  │              │
//! │  └────────────┘  └────────────┘              │
//! │  ┌────────────┐  ┌────────────┐              │
//! │  │ RetryQueue │  │ AuditStore │              │
//! │  │ FIFO, tick │  │ append-only│              │
//! │  └────────────┘  └────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All directory mutation, dispatch, and retry flushing happens inside
//! one `select!` loop, so no locking is needed and a retry flush can
//! never reenter itself. The loop owns three deadlines: the retry tick
//! (armed only while the queue is non-empty, and held during a
//! compaction handshake), the cleanup cadence, and the optional
//! keepalive cadence.

pub mod directory;
pub mod dispatch;
pub mod reply;
pub mod retry;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::audit::{AuditStore, DispatchRecord, ReplyIssued};
use crate::config::RouterConfig;
use crate::protocol::{ProxyEvent, RouterEvent};
use crate::time::TimeProvider;
use crate::types::{Address, InboxId, MessageId, Payload, ReplyId};

pub use directory::{normalize, Directory};
pub use dispatch::{normalize_attempts, resolve, DispatchTarget, PendingMessage};
pub use reply::{ReplyRecord, ReplyTable};
pub use retry::RetryQueue;

/// The routing process.
///
/// Holds the authoritative subscriber directory and consumes
/// [`ProxyEvent`]s until the proxy shuts down or closes the channel.
pub struct Router<A: AuditStore, T: TimeProvider> {
    config: RouterConfig,
    directory: Directory,
    retries: RetryQueue,
    replies: ReplyTable,
    /// True between emitting `CleanupRequest` and adopting `Compacted`.
    compacting: bool,
    audit: A,
    time: T,
    events: mpsc::UnboundedReceiver<ProxyEvent>,
    outbound: mpsc::UnboundedSender<RouterEvent>,
}

/// Sleep until a deadline on the provider timeline; pend forever when
/// there is none. Recreating the future every loop iteration keeps the
/// deadline fixed, so interleaved events cannot push a tick back.
async fn deadline_sleep<T: TimeProvider>(time: &T, deadline: Option<Duration>) {
    match deadline {
        Some(deadline) => {
            time.sleep(deadline.saturating_sub(time.now())).await;
        }
        None => std::future::pending().await,
    }
}

impl<A: AuditStore, T: TimeProvider> Router<A, T> {
    /// Create a router over an assembled channel pair.
    ///
    /// Most callers want [`crate::bus::build`] or
    /// [`crate::bus::spawn_local`] instead.
    pub fn new(
        config: RouterConfig,
        audit: A,
        time: T,
        events: mpsc::UnboundedReceiver<ProxyEvent>,
        outbound: mpsc::UnboundedSender<RouterEvent>,
    ) -> Self {
        Self {
            config,
            directory: Directory::new(),
            retries: RetryQueue::new(),
            replies: ReplyTable::new(),
            compacting: false,
            audit,
            time,
            events,
            outbound,
        }
    }

    /// Run the router until shutdown.
    ///
    /// Signals readiness exactly once, immediately; the proxy flushes
    /// its buffered traffic on receipt.
    pub async fn run(mut self) {
        self.emit(RouterEvent::Ready);
        tracing::debug!("router ready");

        let time = self.time.clone();
        let mut next_cleanup = time.now() + self.config.cleanup_interval;
        let mut next_keepalive = self.config.keepalive_interval.map(|i| time.now() + i);

        loop {
            // The tick is held while a compaction handshake is
            // outstanding; a flush then would emit deliveries carrying
            // addresses the proxy is about to remap. It fires as soon
            // as the mapping is adopted.
            let retry_deadline = if self.compacting {
                None
            } else {
                self.retries.deadline()
            };
            tokio::select! {
                event = self.events.recv() => match event {
                    None | Some(ProxyEvent::Shutdown) => {
                        tracing::debug!("router shutting down");
                        break;
                    }
                    Some(event) => self.handle_event(event).await,
                },
                _ = deadline_sleep(&time, retry_deadline) => {
                    self.flush_retries().await;
                }
                _ = deadline_sleep(&time, Some(next_cleanup)) => {
                    self.maybe_request_cleanup();
                    next_cleanup = time.now() + self.config.cleanup_interval;
                }
                _ = deadline_sleep(&time, next_keepalive) => {
                    self.emit(RouterEvent::Ping);
                    if let Some(interval) = self.config.keepalive_interval {
                        next_keepalive = Some(time.now() + interval);
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ProxyEvent) {
        match event {
            ProxyEvent::Register { name, address, id } => {
                match self.directory.register(&name, address, id) {
                    Ok(()) => tracing::debug!(%name, %address, %id, "handler registered"),
                    Err(error) => tracing::error!(%error, %name, "registration rejected"),
                }
            }
            ProxyEvent::Deregister { address } => match self.directory.deregister(address) {
                Ok(id) => tracing::debug!(%address, %id, "handler deregistered"),
                Err(error) => tracing::warn!(%error, "deregistration for unknown address"),
            },
            ProxyEvent::Compacted { moves } => {
                let dropped = self.directory.compact(&moves);
                self.replies.remap(&moves);
                self.compacting = false;
                tracing::debug!(
                    live = self.directory.len(),
                    dropped,
                    "compaction mapping adopted"
                );
                self.emit(RouterEvent::CompactionComplete);
            }
            ProxyEvent::Send {
                recipient,
                payload,
                sender,
                message_id,
                max_attempts,
            } => {
                let message = PendingMessage {
                    message_id,
                    target: DispatchTarget::Name(normalize(&recipient)),
                    payload,
                    sender,
                    max_attempts: normalize_attempts(max_attempts),
                    attempts: 0,
                };
                self.dispatch(message).await;
            }
            ProxyEvent::Reply {
                reply_id,
                payload,
                sender,
                message_id,
                max_attempts,
                reply_all,
            } => {
                self.handle_reply(reply_id, payload, sender, message_id, max_attempts, reply_all)
                    .await;
            }
            // Handled by the run loop before it gets here.
            ProxyEvent::Shutdown => {}
        }
    }

    /// Dispatch one message: audit, resolve, deliver or queue or drop.
    ///
    /// First dispatches and retry flushes share this path; the attempt
    /// counter is the only difference. Never panics and never leaves a
    /// message half-queued; on audit failure the lookup result alone
    /// decides the outcome.
    async fn dispatch(&mut self, mut message: PendingMessage) {
        let record = DispatchRecord {
            message_id: message.message_id,
            sender: message.sender,
            recipient: message.target.recipient().to_string(),
            payload: message.payload.clone(),
            attempt: (message.attempts > 0).then_some(message.attempts),
        };
        if let Err(error) = self.audit.record_dispatch(record).await {
            tracing::error!(%error, message_id = %message.message_id, "audit write failed");
        }

        let addresses = resolve(&self.directory, &message.target);
        if !addresses.is_empty() {
            let reply_id = match &message.target {
                DispatchTarget::Name(name) => {
                    Some(
                        self.issue_reply_id(name.clone(), message.sender, addresses.clone())
                            .await,
                    )
                }
                DispatchTarget::Sender { .. } => None,
            };
            tracing::trace!(
                message_id = %message.message_id,
                recipients = addresses.len(),
                "dispatch resolved"
            );
            self.emit(RouterEvent::Deliver {
                addresses,
                payload: message.payload,
                reply_id,
            });
            return;
        }

        // UnknownRecipient: one attempt spent on the failed lookup.
        message.attempts += 1;
        if message.is_exhausted() {
            if message.attempts > 1 {
                tracing::debug!(
                    message_id = %message.message_id,
                    recipient = message.target.recipient(),
                    attempts = message.attempts,
                    "attempts exhausted, message dropped"
                );
            } else {
                tracing::trace!(
                    message_id = %message.message_id,
                    recipient = message.target.recipient(),
                    "no subscriber, message dropped"
                );
            }
            return;
        }
        let now = self.time.now();
        self.retries
            .enqueue(message, now, self.config.retry_interval);
    }

    /// Mint a reply id and persist its correlation record.
    async fn issue_reply_id(
        &mut self,
        recipient: String,
        sender: Option<InboxId>,
        addresses: Vec<Address>,
    ) -> ReplyId {
        let reply_id = ReplyId::random();
        self.replies.insert(
            reply_id,
            ReplyRecord {
                recipient: recipient.clone(),
                sender,
                addresses,
            },
        );
        let record = ReplyIssued {
            reply_id,
            recipient,
            sender,
        };
        if let Err(error) = self.audit.record_reply_issued(record).await {
            tracing::error!(%error, %reply_id, "audit write failed");
        }
        reply_id
    }

    async fn handle_reply(
        &mut self,
        reply_id: ReplyId,
        payload: Payload,
        sender: Option<InboxId>,
        message_id: MessageId,
        max_attempts: Option<u32>,
        reply_all: bool,
    ) {
        let Some(record) = self.replies.get(&reply_id).cloned() else {
            // No name exists to re-resolve, so this is terminal.
            tracing::warn!(%reply_id, "unknown reply id, message dropped");
            return;
        };

        match record.sender {
            Some(target) => {
                let message = PendingMessage {
                    message_id,
                    target: DispatchTarget::Sender {
                        id: target,
                        recipient: record.recipient.clone(),
                    },
                    payload: payload.clone(),
                    sender,
                    max_attempts: normalize_attempts(max_attempts),
                    attempts: 0,
                };
                self.dispatch(message).await;
            }
            None => {
                tracing::debug!(%reply_id, "original sender was anonymous, no sender leg");
            }
        }

        if reply_all {
            self.broadcast_reply(&record, reply_id, payload, sender, message_id)
                .await;
        }
    }

    /// Deliver a reply to every original recipient except the replier.
    ///
    /// Each target is independent: addresses whose handlers vanished
    /// since the original dispatch are skipped, and the rest still
    /// receive the payload.
    async fn broadcast_reply(
        &mut self,
        record: &ReplyRecord,
        reply_id: ReplyId,
        payload: Payload,
        sender: Option<InboxId>,
        message_id: MessageId,
    ) {
        let replier = sender.and_then(|id| self.directory.address_of(id));
        let addresses: Vec<Address> = record
            .addresses
            .iter()
            .copied()
            .filter(|address| Some(*address) != replier)
            .filter(|address| self.directory.is_live(*address))
            .collect();
        if addresses.is_empty() {
            tracing::trace!(%reply_id, "no surviving recipients for broadcast reply");
            return;
        }

        let audit_record = DispatchRecord {
            message_id,
            sender,
            recipient: record.recipient.clone(),
            payload: payload.clone(),
            attempt: None,
        };
        if let Err(error) = self.audit.record_dispatch(audit_record).await {
            tracing::error!(%error, %message_id, "audit write failed");
        }
        self.emit(RouterEvent::Deliver {
            addresses,
            payload,
            reply_id: None,
        });
    }

    /// Re-dispatch everything queued before this tick, FIFO.
    ///
    /// Misses re-enqueue themselves through `dispatch`, landing after
    /// the drained snapshot; they are retried next tick, not within
    /// this pass. The tick is re-armed only after the pass completes.
    async fn flush_retries(&mut self) {
        let pass = self.retries.drain_pass();
        tracing::trace!(queued = pass.len(), "retry flush");
        for message in pass {
            self.dispatch(message).await;
        }
        let now = self.time.now();
        self.retries
            .complete_pass(now, self.config.retry_interval);
    }

    /// Ask the proxy to compact, but only when removals accumulated and
    /// no handshake is already outstanding.
    fn maybe_request_cleanup(&mut self) {
        if self.compacting || self.directory.pending_removals() == 0 {
            return;
        }
        tracing::debug!(
            removals = self.directory.pending_removals(),
            "requesting address compaction"
        );
        self.compacting = true;
        self.emit(RouterEvent::CleanupRequest);
    }

    fn emit(&self, event: RouterEvent) {
        if self.outbound.send(event).is_err() {
            tracing::trace!("proxy side closed, event discarded");
        }
    }
}
