//! Shared identifier and payload types.
//!
//! Every message, inbox, and reply carries a randomly generated 128-bit
//! identifier. Identifiers are minted once at creation and never reused,
//! which lets the router correlate replies and audit rows across
//! compaction without coordinating a counter between the two halves of
//! the bus.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message body carried through the bus.
///
/// Payloads are opaque to the router. Structured JSON keeps the wire
/// protocol self-describing and lets audit rows be inspected without
/// knowing the subscriber's schema.
pub type Payload = serde_json::Value;

/// Random 128-bit identifier, stored as two `u64` halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Uid {
    /// High 64 bits.
    pub first: u64,
    /// Low 64 bits.
    pub second: u64,
}

impl Uid {
    /// Mint a fresh identifier from thread-local randomness.
    pub fn random() -> Self {
        Self {
            first: rand::random(),
            second: rand::random(),
        }
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:016x}", self.first, self.second)
    }
}

macro_rules! uid_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name(
            /// Raw 128-bit value.
            pub Uid,
        );

        impl $name {
            /// Mint a fresh identifier.
            pub fn random() -> Self {
                Self(Uid::random())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uid_newtype! {
    /// Stable identity of a registered inbox.
    ///
    /// Survives compaction; the slot index an inbox occupies does not.
    InboxId
}

uid_newtype! {
    /// Identity of a single send or reply, shared by every retry attempt.
    MessageId
}

uid_newtype! {
    /// Correlation handle delivered alongside a by-name message so the
    /// recipient can answer the sender later.
    ReplyId
}

/// Positional slot index of an inbox on the proxy side.
///
/// Addresses are dense and reassigned by compaction, so they must never
/// be stored across a cleanup cycle without going through the remap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(
    /// Slot index.
    pub usize,
);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
