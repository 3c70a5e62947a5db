//! Client proxy: handler table, buffering, and callback delivery.
//!
//! The proxy is the application-facing half of the bus. It keeps the
//! dense handler table whose indexes are the router's addresses,
//! buffers outbound traffic until the router signals readiness, invokes
//! handler callbacks synchronously on delivery, and fulfills the
//! router's compaction requests.
//!
//! [`Proxy`] is a cheap cloneable handle; [`ProxyDriver`] is the
//! companion task that consumes [`RouterEvent`]s. Both sides share
//! state through `Rc<RefCell<..>>`; the whole bus is single-threaded.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::mpsc;

use crate::error::SubscriberFault;
use crate::protocol::{AddressMove, ProxyEvent, RouterEvent};
use crate::types::{Address, InboxId, MessageId, Payload, ReplyId};

/// One message handed to a handler callback.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Application data.
    pub payload: Payload,
    /// Correlation token to `reply`/`reply_all` with; `None` when this
    /// delivery is itself a reply.
    pub reply_id: Option<ReplyId>,
}

/// Handler callback: invoked synchronously per delivery; an `Err`
/// disconnects the subscriber permanently.
pub type Handler = Box<dyn FnMut(Delivery) -> Result<(), SubscriberFault>>;

struct InboxSlot {
    id: InboxId,
    /// Taken out during invocation so handlers can reenter the proxy.
    callback: Option<Handler>,
    /// Set on disconnect; the slot stays until compaction reclaims it.
    disconnected: bool,
}

struct ProxyShared {
    inboxes: Vec<InboxSlot>,
    /// False until the router signals readiness, and during the
    /// compaction handshake.
    ready: bool,
    /// Outbound envelopes held back while not ready, FIFO.
    buffer: VecDeque<ProxyEvent>,
    to_router: mpsc::UnboundedSender<ProxyEvent>,
}

impl ProxyShared {
    /// Send through the readiness gate: buffered while the router is
    /// not accepting traffic, forwarded in order otherwise.
    fn post(&mut self, event: ProxyEvent) {
        if self.ready {
            self.send_direct(event);
        } else {
            self.buffer.push_back(event);
        }
    }

    /// Send bypassing the gate (compaction handshake, shutdown).
    fn send_direct(&self, event: ProxyEvent) {
        if self.to_router.send(event).is_err() {
            tracing::warn!("router side closed, event discarded");
        }
    }

    fn flush(&mut self) {
        while let Some(event) = self.buffer.pop_front() {
            self.send_direct(event);
        }
    }

    /// Mark the slot dead and tell the router. Idempotent.
    fn disconnect_slot(&mut self, index: usize) {
        let Some(slot) = self.inboxes.get_mut(index) else {
            return;
        };
        if slot.disconnected {
            return;
        }
        slot.disconnected = true;
        slot.callback = None;
        self.post(ProxyEvent::Deregister {
            address: Address(index),
        });
    }

    /// Drop disconnected slots and compute the old→new mapping.
    ///
    /// The mapping is derived from a single pass over the full old
    /// table, never from indexes already shifted within the pass.
    fn compact(&mut self) -> Vec<AddressMove> {
        let old = std::mem::take(&mut self.inboxes);
        let mut moves = Vec::new();
        let mut kept = Vec::new();
        for (old_index, slot) in old.into_iter().enumerate() {
            if slot.disconnected {
                continue;
            }
            moves.push(AddressMove {
                old: Address(old_index),
                new: Address(kept.len()),
            });
            kept.push(slot);
        }
        self.inboxes = kept;
        moves
    }
}

/// Application-facing handle to the bus.
///
/// Cloning is cheap; all clones share one handler table. Every method
/// is callable before the router is ready: traffic is buffered in
/// order and flushed the instant readiness arrives.
#[derive(Clone)]
pub struct Proxy {
    shared: Rc<RefCell<ProxyShared>>,
}

impl Proxy {
    /// Create an unready proxy over an assembled outbound channel.
    ///
    /// Most callers want [`crate::bus::build`] or
    /// [`crate::bus::spawn_local`] instead.
    pub fn new(to_router: mpsc::UnboundedSender<ProxyEvent>) -> Self {
        Self {
            shared: Rc::new(RefCell::new(ProxyShared {
                inboxes: Vec::new(),
                ready: false,
                buffer: VecDeque::new(),
                to_router,
            })),
        }
    }

    /// Register a handler under `name` and return its stable id.
    ///
    /// The id survives compaction and is the token for `disconnect` and
    /// for reply correlation.
    pub fn register_handler(
        &self,
        name: &str,
        callback: impl FnMut(Delivery) -> Result<(), SubscriberFault> + 'static,
    ) -> InboxId {
        let id = InboxId::random();
        let mut shared = self.shared.borrow_mut();
        let address = Address(shared.inboxes.len());
        shared.inboxes.push(InboxSlot {
            id,
            callback: Some(Box::new(callback)),
            disconnected: false,
        });
        shared.post(ProxyEvent::Register {
            name: name.to_string(),
            address,
            id,
        });
        id
    }

    /// Disconnect a handler by id.
    ///
    /// Immediate and permanent: the callback is dropped and the router
    /// is told to deregister the address. In-flight by-name retries are
    /// not cancelled; they may later resolve to a different handler
    /// registered under the same name.
    pub fn disconnect(&self, id: InboxId) {
        let mut shared = self.shared.borrow_mut();
        if let Some(index) = shared.inboxes.iter().position(|slot| slot.id == id) {
            shared.disconnect_slot(index);
        } else {
            tracing::warn!(%id, "disconnect for unknown handler id");
        }
    }

    /// Publish a payload to every handler registered under `recipient`,
    /// with a single delivery attempt and no reply correlation back to
    /// a handler of ours.
    pub fn send(&self, recipient: &str, payload: Payload) {
        self.send_from(recipient, payload, None, Some(1));
    }

    /// Publish with an originating handler and an attempt budget.
    ///
    /// `max_attempts` is clamped to at least 1; `None` keeps the
    /// message in the retry queue until a subscriber appears.
    pub fn send_from(
        &self,
        recipient: &str,
        payload: Payload,
        sender: Option<InboxId>,
        max_attempts: Option<u32>,
    ) {
        self.shared.borrow_mut().post(ProxyEvent::Send {
            recipient: recipient.to_string(),
            payload,
            sender,
            message_id: MessageId::random(),
            max_attempts: max_attempts.map(|max| max.max(1)),
        });
    }

    /// Route a payload back to the original sender of the delivery that
    /// carried `reply_id`.
    pub fn reply(
        &self,
        reply_id: ReplyId,
        payload: Payload,
        sender: Option<InboxId>,
        max_attempts: Option<u32>,
    ) {
        self.post_reply(reply_id, payload, sender, max_attempts, false);
    }

    /// Route a payload back to the original sender and to every
    /// original recipient except the replying handler itself.
    pub fn reply_all(
        &self,
        reply_id: ReplyId,
        payload: Payload,
        sender: Option<InboxId>,
        max_attempts: Option<u32>,
    ) {
        self.post_reply(reply_id, payload, sender, max_attempts, true);
    }

    fn post_reply(
        &self,
        reply_id: ReplyId,
        payload: Payload,
        sender: Option<InboxId>,
        max_attempts: Option<u32>,
        reply_all: bool,
    ) {
        self.shared.borrow_mut().post(ProxyEvent::Reply {
            reply_id,
            payload,
            sender,
            message_id: MessageId::random(),
            max_attempts: max_attempts.map(|max| max.max(1)),
            reply_all,
        });
    }

    /// Stop the router loop. Bypasses the outbound buffer.
    pub fn shutdown(&self) {
        self.shared.borrow().send_direct(ProxyEvent::Shutdown);
    }

    /// Number of handler slots, live and awaiting compaction alike.
    /// The next registration lands at this address.
    pub fn slot_count(&self) -> usize {
        self.shared.borrow().inboxes.len()
    }

    /// Whether outbound traffic is currently flowing (readiness
    /// received and no compaction in progress).
    pub fn is_ready(&self) -> bool {
        self.shared.borrow().ready
    }
}

/// Companion task consuming router events for a [`Proxy`].
pub struct ProxyDriver {
    shared: Rc<RefCell<ProxyShared>>,
    from_router: mpsc::UnboundedReceiver<RouterEvent>,
}

impl ProxyDriver {
    /// Pair a driver with the proxy whose state it animates.
    pub fn new(proxy: &Proxy, from_router: mpsc::UnboundedReceiver<RouterEvent>) -> Self {
        Self {
            shared: Rc::clone(&proxy.shared),
            from_router,
        }
    }

    /// Run until the router side closes its channel.
    pub async fn run(mut self) {
        while let Some(event) = self.from_router.recv().await {
            match event {
                RouterEvent::Ready | RouterEvent::CompactionComplete => {
                    let mut shared = self.shared.borrow_mut();
                    shared.ready = true;
                    shared.flush();
                }
                RouterEvent::Deliver {
                    addresses,
                    payload,
                    reply_id,
                } => {
                    for address in addresses {
                        self.deliver(address, payload.clone(), reply_id);
                    }
                }
                RouterEvent::CleanupRequest => {
                    let moves = {
                        let mut shared = self.shared.borrow_mut();
                        shared.ready = false;
                        shared.compact()
                    };
                    tracing::debug!(live = moves.len(), "handler table compacted");
                    // Bypasses the paused gate; the router answers with
                    // CompactionComplete which re-opens it.
                    self.shared
                        .borrow()
                        .send_direct(ProxyEvent::Compacted { moves });
                }
                RouterEvent::Ping => {
                    tracing::trace!("keepalive ping");
                }
            }
        }
        tracing::debug!("router side closed, proxy driver stopping");
    }

    /// Invoke one handler. The callback is moved out of its slot for
    /// the duration of the call so it may reenter the proxy (send,
    /// reply, register, disconnect) without a double borrow.
    fn deliver(&self, address: Address, payload: Payload, reply_id: Option<ReplyId>) {
        let taken = {
            let mut shared = self.shared.borrow_mut();
            match shared.inboxes.get_mut(address.0) {
                Some(slot) if !slot.disconnected => {
                    slot.callback.take().map(|callback| (slot.id, callback))
                }
                Some(_) => None,
                None => {
                    tracing::warn!(%address, "delivery to unknown address");
                    None
                }
            }
        };
        let Some((id, mut callback)) = taken else {
            return;
        };

        let result = callback(Delivery { payload, reply_id });

        let mut shared = self.shared.borrow_mut();
        if let Some(slot) = shared.inboxes.get_mut(address.0) {
            if !slot.disconnected && slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
        if let Err(fault) = result {
            tracing::warn!(%id, %fault, "subscriber fault, disconnecting handler");
            shared.disconnect_slot(address.0);
        }
    }
}
