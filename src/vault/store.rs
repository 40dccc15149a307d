//! PIN-protected vault file.
//!
//! `FileVault` keeps every record in memory and rewrites the file on
//! each mutation. The in-memory map only changes once the file write
//! succeeds, so readers never see a value that is not on disk.  Opening
//! a vault leaves it locked: public records are usable right away,
//! private records need `unlock` with the PIN.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use zeroize::Zeroize;

use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::kdf::{derive_master_key, generate_salt, Argon2Params};
use crate::crypto::keys::MasterKey;
use crate::errors::{Result, StorageError};

use super::counter::{CounterCache, RecordIo};
use super::format::{self, StoredRecord, VaultHeader, CURRENT_VERSION};
use super::{Domain, RecordKey, Vault};

struct FileRecords {
    path: PathBuf,
    header: VaultHeader,
    /// Stored bytes per record; private values are still encrypted.
    records: BTreeMap<RecordKey, Vec<u8>>,
    /// Present only while unlocked (zeroized on drop).
    master_key: Option<MasterKey>,
}

impl FileRecords {
    fn master_key(&self) -> Result<&MasterKey> {
        self.master_key.as_ref().ok_or(StorageError::Locked)
    }

    fn save(&self) -> Result<()> {
        self.save_records(&self.records)
    }

    /// Write `records` to disk without touching the in-memory map.
    fn save_records(&self, records: &BTreeMap<RecordKey, Vec<u8>>) -> Result<()> {
        let records: Vec<StoredRecord> = records
            .iter()
            .map(|(record, value)| StoredRecord {
                namespace: record.namespace,
                key: record.key,
                domain: record.domain,
                value: value.clone(),
            })
            .collect();
        format::write_vault(&self.path, &self.header, &records)
    }

    fn remove(&mut self, record: RecordKey) -> Result<()> {
        if record.domain == Domain::Private {
            self.master_key()?;
        }
        let Some(previous) = self.records.remove(&record) else {
            return Ok(());
        };
        if let Err(e) = self.save() {
            self.records.insert(record, previous);
            return Err(e);
        }
        Ok(())
    }
}

impl RecordIo for FileRecords {
    fn read(&self, record: RecordKey) -> Result<Option<Vec<u8>>> {
        if record.domain == Domain::Public {
            return Ok(self.records.get(&record).cloned());
        }

        let master_key = self.master_key()?;
        let Some(ciphertext) = self.records.get(&record) else {
            return Ok(None);
        };

        let mut record_key = master_key.derive_record_key(record.namespace, record.key)?;
        let plaintext = decrypt(&record_key, ciphertext, &record.aad());
        record_key.zeroize();
        plaintext.map(Some)
    }

    fn write(&mut self, record: RecordKey, value: &[u8]) -> Result<()> {
        let stored = match record.domain {
            Domain::Public => value.to_vec(),
            Domain::Private => {
                let mut record_key = self
                    .master_key()?
                    .derive_record_key(record.namespace, record.key)?;
                let ciphertext = encrypt(&record_key, value, &record.aad());
                record_key.zeroize();
                ciphertext?
            }
        };

        let previous = self.records.insert(record, stored);
        if let Err(e) = self.save() {
            // Readers must keep seeing what is on disk.
            match previous {
                Some(previous) => self.records.insert(record, previous),
                None => self.records.remove(&record),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Vault persisted to a single encrypted file.
pub struct FileVault {
    inner: FileRecords,
    counters: CounterCache,
}

impl FileVault {
    /// Create a new vault file at `path` protected by `pin`.
    ///
    /// The returned vault is unlocked.
    pub fn create(path: &Path, pin: &[u8], params: &Argon2Params) -> Result<Self> {
        if path.exists() {
            return Err(StorageError::VaultAlreadyExists(path.to_path_buf()));
        }

        let salt = generate_salt();
        let mut master_bytes = derive_master_key(pin, &salt, params)?;
        let master_key = MasterKey::new(master_bytes);
        master_bytes.zeroize();

        let header = VaultHeader {
            version: CURRENT_VERSION,
            salt: salt.to_vec(),
            created_at: Utc::now(),
            argon2_params: (*params).into(),
            pin_verifier: master_key.pin_verifier()?,
        };

        let inner = FileRecords {
            path: path.to_path_buf(),
            header,
            records: BTreeMap::new(),
            master_key: Some(master_key),
        };
        inner.save()?;

        tracing::info!(path = %path.display(), "vault created");

        Ok(Self {
            inner,
            counters: CounterCache::new(),
        })
    }

    /// Open an existing vault file.  The vault starts locked.
    pub fn open(path: &Path) -> Result<Self> {
        let raw = format::read_vault(path)?;
        let records = raw
            .records
            .into_iter()
            .map(|stored| (stored.record_key(), stored.value))
            .collect();

        Ok(Self {
            inner: FileRecords {
                path: path.to_path_buf(),
                header: raw.header,
                records,
                master_key: None,
            },
            counters: CounterCache::new(),
        })
    }

    /// Derive the master key from `pin` and verify it.
    ///
    /// Fails with `WrongPin` and stays locked on a mismatch.
    pub fn unlock(&mut self, pin: &[u8]) -> Result<()> {
        let params: Argon2Params = self.inner.header.argon2_params.into();
        let mut master_bytes = derive_master_key(pin, &self.inner.header.salt, &params)?;
        let master_key = MasterKey::new(master_bytes);
        master_bytes.zeroize();

        if let Err(e) = master_key.check_pin_verifier(&self.inner.header.pin_verifier) {
            tracing::warn!(path = %self.inner.path.display(), "unlock rejected");
            return Err(e);
        }

        self.inner.master_key = Some(master_key);
        tracing::debug!(path = %self.inner.path.display(), "vault unlocked");
        Ok(())
    }

    /// Drop the master key.  Private records become inaccessible.
    pub fn lock(&mut self) {
        self.inner.master_key = None;
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.header.created_at
    }

    /// Number of stored records, public and private.
    pub fn record_count(&self) -> usize {
        self.inner.records.len()
    }
}

impl Vault for FileVault {
    fn is_unlocked(&self) -> bool {
        self.inner.master_key.is_some()
    }

    fn get(&self, record: RecordKey) -> Result<Option<Vec<u8>>> {
        self.inner.read(record)
    }

    fn set(&mut self, record: RecordKey, value: &[u8]) -> Result<()> {
        self.inner.write(record, value)
    }

    fn delete(&mut self, record: RecordKey) -> Result<()> {
        self.inner.remove(record)?;
        self.counters.forget(record);
        Ok(())
    }

    /// Remove every record.  The PIN header is kept.
    fn wipe(&mut self) -> Result<()> {
        self.inner.save_records(&BTreeMap::new())?;
        self.inner.records.clear();
        self.counters.clear();
        tracing::info!(path = %self.inner.path.display(), "vault wiped");
        Ok(())
    }

    fn next_counter(&mut self, record: RecordKey) -> Result<u32> {
        self.counters.allocate(&mut self.inner, record)
    }

    fn set_counter(&mut self, record: RecordKey, count: u32) -> Result<()> {
        self.counters.set(&mut self.inner, record, count)
    }

    fn peek_counter(&self, record: RecordKey) -> Result<Option<u32>> {
        self.counters.peek(&self.inner, record)
    }
}
