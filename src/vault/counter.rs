//! Restart-safe monotonic counters with amortized writes.
//!
//! The persisted record does not hold the exact counter value.  It holds
//! a 4-byte big-endian high-water mark `R`: every value ever handed out
//! is strictly below `R`.  The next value `n` lives in RAM.
//!
//! - cold start: `n = R` (or 0 when the record is absent)
//! - allocate `v = n`; when `v >= R`, persist `R = v + COUNTER_BATCH`
//!   before returning `v`; then `n = v + 1`
//! - `set(c)`: persist `R = c + 1`, `n = c + 1`
//!
//! After an interruption the counter resumes at `R`, which is above
//! every value returned before it, so no value repeats.  At most
//! `COUNTER_BATCH - 1` values are skipped per restart, and the record is
//! written once per `COUNTER_BATCH` allocations.  `u32::MAX` itself is
//! never handed out.

use std::collections::HashMap;

use crate::errors::{Result, StorageError};

use super::RecordKey;

/// Number of allocations covered by one persisted high-water mark.
pub const COUNTER_BATCH: u32 = 64;

/// Raw record access a vault exposes to the counter logic.
pub(crate) trait RecordIo {
    fn read(&self, record: RecordKey) -> Result<Option<Vec<u8>>>;
    fn write(&mut self, record: RecordKey, value: &[u8]) -> Result<()>;
}

/// RAM half of every counter a vault manages.
#[derive(Debug, Default)]
pub struct CounterCache {
    next: HashMap<RecordKey, u32>,
}

impl CounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate<S: RecordIo + ?Sized>(
        &mut self,
        store: &mut S,
        record: RecordKey,
    ) -> Result<u32> {
        let mark = read_mark(store, record)?;
        let value = match self.next.get(&record) {
            Some(next) => *next,
            None => mark.unwrap_or(0),
        };

        if value == u32::MAX {
            return Err(StorageError::CounterExhausted {
                namespace: record.namespace,
                key: record.key,
            });
        }

        if mark.map_or(true, |mark| value >= mark) {
            let new_mark = value.saturating_add(COUNTER_BATCH);
            store.write(record, &new_mark.to_be_bytes())?;
            tracing::debug!(
                namespace = record.namespace,
                key = record.key,
                mark = new_mark,
                "counter high-water mark advanced"
            );
        }

        self.next.insert(record, value + 1);
        Ok(value)
    }

    pub(crate) fn set<S: RecordIo + ?Sized>(
        &mut self,
        store: &mut S,
        record: RecordKey,
        count: u32,
    ) -> Result<()> {
        let next = count.saturating_add(1);
        store.write(record, &next.to_be_bytes())?;
        self.next.insert(record, next);
        Ok(())
    }

    pub(crate) fn peek<S: RecordIo + ?Sized>(
        &self,
        store: &S,
        record: RecordKey,
    ) -> Result<Option<u32>> {
        match self.next.get(&record) {
            Some(next) => Ok(Some(*next)),
            None => read_mark(store, record),
        }
    }

    /// Drop RAM state for one counter (its record was deleted).
    pub fn forget(&mut self, record: RecordKey) {
        self.next.remove(&record);
    }

    /// Drop all RAM state, as after a power cycle or wipe.
    pub fn clear(&mut self) {
        self.next.clear();
    }
}

fn read_mark<S: RecordIo + ?Sized>(store: &S, record: RecordKey) -> Result<Option<u32>> {
    match store.read(record)? {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => {
            let raw: [u8; 4] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| StorageError::Corrupted {
                    namespace: record.namespace,
                    key: record.key,
                    reason: format!("counter record has {} bytes, expected 4", bytes.len()),
                })?;
            Ok(Some(u32::from_be_bytes(raw)))
        }
    }
}
