//! Binary vault file format.
//!
//! A vault file has this layout:
//!
//! ```text
//! [WSTV: 4 bytes][version: 1 byte][header_len: 4 bytes LE][header JSON][records JSON]
//! ```
//!
//! - **Magic** (`WSTV`): identifies the file as a wallet-storage vault.
//! - **Version**: format version (currently `1`).
//! - **Header length**: little-endian u32 telling us where the header
//!   JSON ends and the records JSON begins.
//! - **Header JSON**: serialized `VaultHeader`.
//! - **Records JSON**: serialized `Vec<StoredRecord>`.
//!
//! There is no file-wide MAC: public records must stay writable while
//! the vault is locked, when no key is available.  Private records are
//! authenticated individually by AES-GCM with their address as AAD.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Domain, RecordKey};
use crate::crypto::Argon2Params;
use crate::errors::{Result, StorageError};

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"WSTV";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 4 (header_len).
const PREFIX_LEN: usize = 9;

/// Argon2 parameters stored in the header so unlock uses the exact
/// settings the vault was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArgon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<Argon2Params> for StoredArgon2Params {
    fn from(params: Argon2Params) -> Self {
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

impl From<StoredArgon2Params> for Argon2Params {
    fn from(params: StoredArgon2Params) -> Self {
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

/// Metadata stored at the beginning of a vault file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHeader {
    /// Format version.
    pub version: u8,

    /// Salt for Argon2id PIN stretching (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// When this vault was first created.
    pub created_at: DateTime<Utc>,

    pub argon2_params: StoredArgon2Params,

    /// HMAC tag proving knowledge of the PIN (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub pin_verifier: Vec<u8>,
}

/// One record as written to disk.
///
/// Public values are stored as-is; private values hold
/// `nonce || ciphertext || tag`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub namespace: u8,
    pub key: u8,
    pub domain: Domain,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub value: Vec<u8>,
}

impl StoredRecord {
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(self.namespace, self.key, self.domain)
    }
}

/// Write a vault file to disk **atomically**.
///
/// Serializes to a temp file in the same directory, then renames it
/// over the target so readers never see a half-written file.
pub fn write_vault(path: &Path, header: &VaultHeader, records: &[StoredRecord]) -> Result<()> {
    let header_bytes = serde_json::to_vec(header)
        .map_err(|e| StorageError::SerializationError(format!("header: {e}")))?;
    let records_bytes = serde_json::to_vec(records)
        .map_err(|e| StorageError::SerializationError(format!("records: {e}")))?;

    let header_len = u32::try_from(header_bytes.len()).map_err(|_| {
        StorageError::SerializationError(format!(
            "header length {} exceeds u32::MAX",
            header_bytes.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + header_bytes.len() + records_bytes.len());
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(&records_bytes);

    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, &buf)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Parsed contents of a vault file.
pub struct RawVault {
    pub header: VaultHeader,
    pub records: Vec<StoredRecord>,
}

/// Read and parse a vault file.
pub fn read_vault(path: &Path) -> Result<RawVault> {
    if !path.exists() {
        return Err(StorageError::VaultNotFound(path.to_path_buf()));
    }

    let data = fs::read(path)?;

    if data.len() < PREFIX_LEN {
        return Err(StorageError::InvalidVaultFormat(
            "file too small to be a valid vault".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(StorageError::InvalidVaultFormat(
            "missing WSTV magic bytes".into(),
        ));
    }

    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(StorageError::InvalidVaultFormat(format!(
            "unsupported version {version}, expected {CURRENT_VERSION}"
        )));
    }

    let header_len_u32 = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| StorageError::InvalidVaultFormat("bad header length".into()))?,
    );
    let header_len = usize::try_from(header_len_u32).map_err(|_| {
        StorageError::InvalidVaultFormat(format!(
            "header length {header_len_u32} exceeds platform address space"
        ))
    })?;

    let header_end = PREFIX_LEN + header_len;
    if header_end > data.len() {
        return Err(StorageError::InvalidVaultFormat(
            "header length exceeds file size".into(),
        ));
    }

    let header: VaultHeader = serde_json::from_slice(&data[PREFIX_LEN..header_end])
        .map_err(|e| StorageError::InvalidVaultFormat(format!("header JSON: {e}")))?;

    let records: Vec<StoredRecord> = serde_json::from_slice(&data[header_end..])
        .map_err(|e| StorageError::InvalidVaultFormat(format!("records JSON: {e}")))?;

    Ok(RawVault { header, records })
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
