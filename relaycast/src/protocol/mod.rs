//! Proxy ⇄ router protocol envelopes.

pub mod envelope;

pub use envelope::{AddressMove, ProxyEvent, RouterEvent};
