//! # relaycast
//!
//! A decoupled publish/subscribe message bus for components running in
//! one logical execution unit, split into a lightweight client proxy
//! and a dedicated routing task holding the authoritative subscriber
//! directory.
//!
//! ```text
//! ┌───────────────────────────┐        ┌──────────────────────────────┐
//! │ Proxy (application side)  │        │ Router (core)                │
//! │ • dense handler table     │─────── │ • name → address directory   │
//! │ • outbound buffering      │ProxyEv │ • dispatch + retry queue     │
//! │ • callback invocation     │ ─────▶ │ • reply correlation          │
//! │ • fault isolation         │ ◀───── │ • audit trail                │
//! │ • address compaction      │RouterEv│                              │
//! └───────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! Both halves are independent single-threaded tasks joined by an
//! asynchronous in-memory channel pair preserving per-sender FIFO
//! order. Messages are addressed by handler *name*; a dispatch that
//! finds no subscriber can wait in a retry queue for one to appear,
//! bounded by a per-message attempt budget. Every successful dispatch
//! issues a reply id, so handlers can answer the sender, or, with
//! `reply_all`, the sender plus every other original recipient.
//!
//! ## Quick start
//!
//! ```ignore
//! use relaycast::{bus, RouterConfig};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let proxy = bus::spawn_local(RouterConfig::default());
//!
//!     proxy.register_handler("greeter", |delivery| {
//!         println!("got {}", delivery.payload);
//!         Ok(())
//!     });
//!
//!     proxy.send("greeter", serde_json::json!({"hello": "world"}));
//! }).await;
//! ```
//!
//! Not a goal: cross-machine or cross-network distribution. The bus
//! lives and dies inside one process.

#![deny(missing_docs)]

pub mod audit;
pub mod bus;
pub mod config;
pub mod error;
pub mod protocol;
pub mod proxy;
pub mod router;
pub mod time;
pub mod types;

pub use audit::{AuditStore, DispatchRecord, InMemoryAuditStore, ReplyIssued};
pub use config::RouterConfig;
pub use error::{AuditError, DirectoryError, SubscriberFault};
pub use proxy::{Delivery, Proxy, ProxyDriver};
pub use router::Router;
pub use time::{TimeProvider, TokioTimeProvider};
pub use types::{Address, InboxId, MessageId, Payload, ReplyId, Uid};
