//! In-memory vault.
//!
//! Behaves like the device vault (lock state, domain checks, batched
//! counters) without persistence.  `restart` simulates a power cycle:
//! records survive, RAM counter state is lost and the vault locks.

use std::collections::BTreeMap;

use crate::errors::{Result, StorageError};

use super::counter::{CounterCache, RecordIo};
use super::{Domain, RecordKey, Vault};

#[derive(Debug, Default)]
struct MemoryRecords {
    map: BTreeMap<RecordKey, Vec<u8>>,
    unlocked: bool,
    writes: usize,
}

impl MemoryRecords {
    fn check_access(&self, record: RecordKey) -> Result<()> {
        if record.domain == Domain::Private && !self.unlocked {
            return Err(StorageError::Locked);
        }
        Ok(())
    }
}

impl RecordIo for MemoryRecords {
    fn read(&self, record: RecordKey) -> Result<Option<Vec<u8>>> {
        self.check_access(record)?;
        Ok(self.map.get(&record).cloned())
    }

    fn write(&mut self, record: RecordKey, value: &[u8]) -> Result<()> {
        self.check_access(record)?;
        self.map.insert(record, value.to_vec());
        self.writes += 1;
        Ok(())
    }
}

/// Vault kept entirely in RAM.
#[derive(Debug)]
pub struct MemoryVault {
    records: MemoryRecords,
    counters: CounterCache,
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVault {
    /// Create an empty, unlocked vault.
    pub fn new() -> Self {
        Self {
            records: MemoryRecords {
                unlocked: true,
                ..MemoryRecords::default()
            },
            counters: CounterCache::new(),
        }
    }

    pub fn lock(&mut self) {
        self.records.unlocked = false;
    }

    pub fn unlock(&mut self) {
        self.records.unlocked = true;
    }

    /// Simulate a power cycle: keep records, drop RAM state, lock.
    pub fn restart(&mut self) {
        self.counters.clear();
        self.lock();
    }

    /// Number of mutating vault operations (sets and deletes) so far.
    pub fn write_count(&self) -> usize {
        self.records.writes
    }

    /// Whether a record exists, ignoring the lock state.
    pub fn contains(&self, record: RecordKey) -> bool {
        self.records.map.contains_key(&record)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.map.is_empty()
    }
}

impl Vault for MemoryVault {
    fn is_unlocked(&self) -> bool {
        self.records.unlocked
    }

    fn get(&self, record: RecordKey) -> Result<Option<Vec<u8>>> {
        self.records.read(record)
    }

    fn set(&mut self, record: RecordKey, value: &[u8]) -> Result<()> {
        self.records.write(record, value)
    }

    fn delete(&mut self, record: RecordKey) -> Result<()> {
        self.records.check_access(record)?;
        if self.records.map.remove(&record).is_some() {
            self.records.writes += 1;
        }
        self.counters.forget(record);
        Ok(())
    }

    fn wipe(&mut self) -> Result<()> {
        self.records.map.clear();
        self.records.writes += 1;
        self.counters.clear();
        Ok(())
    }

    fn next_counter(&mut self, record: RecordKey) -> Result<u32> {
        self.counters.allocate(&mut self.records, record)
    }

    fn set_counter(&mut self, record: RecordKey, count: u32) -> Result<()> {
        self.counters.set(&mut self.records, record, count)
    }

    fn peek_counter(&self, record: RecordKey) -> Result<Option<u32>> {
        self.counters.peek(&self.records, record)
    }
}
