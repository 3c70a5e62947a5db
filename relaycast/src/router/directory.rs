//! Authoritative name → address directory.
//!
//! The router owns a single `Directory`; the dispatch engine and the
//! retry queue borrow it. Entries mirror the proxy's handler table:
//! one active entry per dense address slot, addressable by normalized
//! name (for publish) and by stable inbox id (for the reply path).

use std::collections::HashMap;

use crate::error::DirectoryError;
use crate::protocol::AddressMove;
use crate::types::{Address, InboxId};

/// Normalize a handler name: trimmed, case-insensitive.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One registered handler as the router sees it.
#[derive(Debug, Clone)]
struct InboxEntry {
    /// Normalized name the handler listens under.
    name: String,
    /// Current slot in the proxy's handler table.
    address: Address,
    /// Stable id, unchanged across compaction.
    id: InboxId,
}

/// Authoritative subscriber directory.
#[derive(Debug, Default)]
pub struct Directory {
    /// Active entries in registration order.
    entries: Vec<InboxEntry>,
    /// Deregistrations since the last compaction; gates cleanup
    /// requests.
    removals: usize,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry under the normalized name.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::AddressInUse`] when an active entry
    /// already occupies `address`, which means the proxy and router
    /// tables have diverged.
    pub fn register(
        &mut self,
        name: &str,
        address: Address,
        id: InboxId,
    ) -> Result<(), DirectoryError> {
        if self.entries.iter().any(|e| e.address == address) {
            return Err(DirectoryError::AddressInUse(address));
        }
        self.entries.push(InboxEntry {
            name: normalize(name),
            address,
            id,
        });
        Ok(())
    }

    /// Remove the entry at `address`.
    ///
    /// The slot itself is not reclaimed until the next compaction.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UnknownAddress`] when no active entry
    /// occupies `address`.
    pub fn deregister(&mut self, address: Address) -> Result<InboxId, DirectoryError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.address == address)
            .ok_or(DirectoryError::UnknownAddress(address))?;
        let entry = self.entries.remove(index);
        self.removals += 1;
        Ok(entry.id)
    }

    /// Every active address under the normalized name, in registration
    /// order. Empty means "no subscriber".
    pub fn lookup(&self, name: &str) -> Vec<Address> {
        let name = normalize(name);
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.address)
            .collect()
    }

    /// Current address of the handler with the given stable id.
    pub fn address_of(&self, id: InboxId) -> Option<Address> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.address)
    }

    /// Whether an active entry occupies `address`.
    pub fn is_live(&self, address: Address) -> bool {
        self.entries.iter().any(|e| e.address == address)
    }

    /// Adopt the proxy's compaction mapping.
    ///
    /// The full mapping is snapshotted before any entry moves, so
    /// multiple simultaneous removals cannot cross-map entries the way
    /// an incremental compare-and-shift would. Entries absent from the
    /// mapping belong to handlers the proxy dropped; they are removed
    /// here too. Returns the number of dropped entries.
    pub fn compact(&mut self, moves: &[AddressMove]) -> usize {
        let mapping: HashMap<Address, Address> =
            moves.iter().map(|m| (m.old, m.new)).collect();
        let before = self.entries.len();
        let remapped: Vec<InboxEntry> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|mut entry| {
                let new = mapping.get(&entry.address)?;
                entry.address = *new;
                Some(entry)
            })
            .collect();
        self.entries = remapped;
        self.removals = 0;
        before - self.entries.len()
    }

    /// Deregistrations accumulated since the last compaction.
    pub fn pending_removals(&self) -> usize {
        self.removals
    }

    /// Number of active entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has no active entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
