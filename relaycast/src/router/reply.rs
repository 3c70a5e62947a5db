//! Reply correlation table.
//!
//! Every successful by-name dispatch mints a reply id and stores a
//! record of who sent it and who received it. `reply` consults the
//! record for the sender; `reply_all` additionally fans out to the
//! recipients captured at dispatch time. Records are not consumed on
//! use; a delivery may be replied to more than once.

use std::collections::HashMap;

use crate::protocol::AddressMove;
use crate::types::{Address, InboxId, ReplyId};

/// Correlation state captured at a successful by-name dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRecord {
    /// Normalized recipient name of the original dispatch.
    pub recipient: String,
    /// Original sender; `None` for anonymous sends, which have no
    /// sender leg to reply to.
    pub sender: Option<InboxId>,
    /// Addresses the original dispatch resolved to, kept current
    /// across compaction.
    pub addresses: Vec<Address>,
}

/// Reply id → record map held by the router.
#[derive(Debug, Default)]
pub struct ReplyTable {
    records: HashMap<ReplyId, ReplyRecord>,
}

impl ReplyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the record for a freshly minted reply id.
    pub fn insert(&mut self, reply_id: ReplyId, record: ReplyRecord) {
        self.records.insert(reply_id, record);
    }

    /// Record for a reply id, if one was ever issued.
    pub fn get(&self, reply_id: &ReplyId) -> Option<&ReplyRecord> {
        self.records.get(reply_id)
    }

    /// Apply a compaction mapping to every stored recipient address.
    ///
    /// Addresses absent from the mapping belonged to handlers the
    /// proxy dropped; they are removed so stale slots can never receive
    /// a broadcast reply meant for someone else.
    pub fn remap(&mut self, moves: &[AddressMove]) {
        let mapping: HashMap<Address, Address> =
            moves.iter().map(|m| (m.old, m.new)).collect();
        for record in self.records.values_mut() {
            record.addresses = record
                .addresses
                .iter()
                .filter_map(|address| mapping.get(address).copied())
                .collect();
        }
    }

    /// Number of issued reply ids.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no reply ids have been issued.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_not_consumed_on_read() {
        let mut table = ReplyTable::new();
        let reply_id = ReplyId::random();
        let record = ReplyRecord {
            recipient: "sensors".to_string(),
            sender: Some(InboxId::random()),
            addresses: vec![Address(0), Address(1)],
        };
        table.insert(reply_id, record.clone());

        assert_eq!(table.get(&reply_id), Some(&record));
        assert_eq!(table.get(&reply_id), Some(&record));
        assert!(table.get(&ReplyId::random()).is_none());
    }

    #[test]
    fn test_remap_moves_and_drops_addresses() {
        let mut table = ReplyTable::new();
        let reply_id = ReplyId::random();
        table.insert(
            reply_id,
            ReplyRecord {
                recipient: "grid".to_string(),
                sender: None,
                addresses: vec![Address(0), Address(2), Address(4)],
            },
        );

        // 0 survives in place, 4 moves to 1, 2 was disconnected.
        table.remap(&[
            AddressMove {
                old: Address(0),
                new: Address(0),
            },
            AddressMove {
                old: Address(4),
                new: Address(1),
            },
        ]);

        let record = table.get(&reply_id).unwrap();
        assert_eq!(record.addresses, vec![Address(0), Address(1)]);
    }
}
