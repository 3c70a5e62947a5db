//! Error types for the relaycast message bus.

use thiserror::Error;

use crate::types::Address;

/// Errors related to subscriber directory operations.
///
/// These indicate a bookkeeping mismatch between the proxy and the
/// router. They are caught and logged at the router's event loop; none
/// of them is fatal.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No active entry exists at the given address.
    #[error("No inbox registered at address {0}")]
    UnknownAddress(Address),

    /// An active entry already occupies the given address.
    #[error("Address {0} already occupied")]
    AddressInUse(Address),
}

/// Errors related to audit trail writes.
///
/// Audit writes are fire-and-forget: these errors are logged and never
/// block, retry, or alter a dispatch outcome.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Appending a record to the store failed.
    #[error("Audit append failed: {0}")]
    AppendFailed(String),

    /// Record serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The audit store is unavailable.
    #[error("Audit store unavailable")]
    Unavailable,
}

/// A handler callback reported failure while processing a delivery.
///
/// The proxy converts this into immediate, permanent disconnection of
/// the offending subscriber instead of propagating it; other handlers
/// in the same delivery batch are unaffected.
#[derive(Debug, Error)]
#[error("Subscriber fault: {reason}")]
pub struct SubscriberFault {
    /// Human-readable description of the failure.
    pub reason: String,
}

impl SubscriberFault {
    /// Create a fault from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
