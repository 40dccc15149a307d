//! Key derivation helpers using HKDF-SHA256.
//!
//! From a single master key we derive:
//! - A unique **per-record** encryption key for each (namespace, key) slot.
//! - A dedicated **verifier key** used to check the PIN on unlock.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{Result, StorageError};

/// Length of derived sub-keys (256 bits).
const KEY_LEN: usize = 32;

/// Message authenticated by the PIN verifier.
const VERIFIER_MESSAGE: &[u8] = b"wallet-storage-pin-verifier";

/// Derive a per-record encryption key from the master key.
///
/// `info` is `"wallet-storage-record:" || namespace || key`, so every
/// record slot gets an independent key.
pub fn derive_record_key(master_key: &[u8], namespace: u8, key: u8) -> Result<[u8; KEY_LEN]> {
    let mut info = b"wallet-storage-record:".to_vec();
    info.push(namespace);
    info.push(key);
    hkdf_derive(master_key, &info)
}

/// Derive the PIN verifier key from the master key.
pub fn derive_verifier_key(master_key: &[u8]) -> Result<[u8; KEY_LEN]> {
    hkdf_derive(master_key, b"wallet-storage-verifier-key")
}

/// Compute the PIN verifier tag stored in the vault header.
pub fn pin_verifier(master_key: &[u8]) -> Result<Vec<u8>> {
    let mut verifier_key = derive_verifier_key(master_key)?;
    let mac = Hmac::<Sha256>::new_from_slice(&verifier_key)
        .map_err(|e| StorageError::HmacError(format!("invalid HMAC key: {e}")));
    verifier_key.zeroize();

    let mut mac = mac?;
    mac.update(VERIFIER_MESSAGE);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Check a stored verifier tag in constant time.
///
/// Returns `WrongPin` when the master key was derived from another PIN.
pub fn check_pin_verifier(master_key: &[u8], expected: &[u8]) -> Result<()> {
    let mut verifier_key = derive_verifier_key(master_key)?;
    let mac = Hmac::<Sha256>::new_from_slice(&verifier_key)
        .map_err(|e| StorageError::HmacError(format!("invalid HMAC key: {e}")));
    verifier_key.zeroize();

    let mut mac = mac?;
    mac.update(VERIFIER_MESSAGE);
    mac.verify_slice(expected)
        .map_err(|_| StorageError::WrongPin)
}

fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| StorageError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A 32-byte master key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the encryption key for one record slot.
    pub fn derive_record_key(&self, namespace: u8, key: u8) -> Result<[u8; KEY_LEN]> {
        derive_record_key(&self.bytes, namespace, key)
    }

    pub fn pin_verifier(&self) -> Result<Vec<u8>> {
        pin_verifier(&self.bytes)
    }

    pub fn check_pin_verifier(&self, expected: &[u8]) -> Result<()> {
        check_pin_verifier(&self.bytes, expected)
    }
}
