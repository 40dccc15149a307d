//! Vault module: the encrypted key-value primitive under the storage layer.
//!
//! This module provides:
//! - The `Vault` trait every backing store implements, plus the
//!   `RecordKey` / `Domain` addressing types
//! - Batched, restart-safe monotonic counters (`counter`)
//! - An in-memory vault for tests and host builds (`memory`)
//! - A PIN-protected encrypted vault file (`format`, `store`)

pub mod counter;
pub mod format;
pub mod memory;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub use counter::COUNTER_BATCH;
pub use memory::MemoryVault;
pub use store::FileVault;

/// Security domain of a record.
///
/// Public records stay readable and writable while the device is
/// locked; private records require an unlocked vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Public,
    Private,
}

/// Address of a single vault record.
///
/// The domain is part of the identity: a public and a private record
/// may share the same (namespace, key) without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub namespace: u8,
    pub key: u8,
    pub domain: Domain,
}

impl RecordKey {
    pub const fn new(namespace: u8, key: u8, domain: Domain) -> Self {
        Self {
            namespace,
            key,
            domain,
        }
    }

    pub fn is_public(&self) -> bool {
        self.domain == Domain::Public
    }

    /// Bytes bound into authenticated encryption for this record.
    pub fn aad(&self) -> [u8; 3] {
        let domain = match self.domain {
            Domain::Public => 0x80,
            Domain::Private => 0x00,
        };
        [self.namespace, self.key, domain]
    }
}

/// Byte-oriented record store the typed storage layer is built on.
///
/// Every call is atomic and durable on return.  Private records fail
/// with `StorageError::Locked` while the vault is locked.
pub trait Vault {
    /// Whether private records are currently accessible.
    fn is_unlocked(&self) -> bool;

    /// Read a record; `None` when it was never written or was deleted.
    fn get(&self, record: RecordKey) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, record: RecordKey, value: &[u8]) -> Result<()>;

    /// Remove a record.  Deleting an absent record is not an error.
    fn delete(&mut self, record: RecordKey) -> Result<()>;

    /// Remove every record, including counters.
    fn wipe(&mut self) -> Result<()>;

    /// Allocate the next value of a monotonic counter.
    fn next_counter(&mut self, record: RecordKey) -> Result<u32>;

    /// Reset a counter so the next allocation returns `count + 1`.
    fn set_counter(&mut self, record: RecordKey, count: u32) -> Result<()>;

    /// Lowest value the next allocation may return, without allocating.
    fn peek_counter(&self, record: RecordKey) -> Result<Option<u32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_part_of_record_identity() {
        let public = RecordKey::new(0x01, 0x09, Domain::Public);
        let private = RecordKey::new(0x01, 0x09, Domain::Private);
        assert_ne!(public, private);
        assert_ne!(public.aad(), private.aad());
    }
}
