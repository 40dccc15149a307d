//! PIN stretching using Argon2id.
//!
//! Device PINs are short, so the vault never uses them directly: the
//! PIN and a per-vault salt go through Argon2id to produce the master
//! key.  Parameters come from `StorageConfig` or the defaults below.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::errors::{Result, StorageError};

/// Length of the salt in bytes (256 bits).
const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 32-byte master key from a PIN and salt.
///
/// The same PIN + salt + params always produce the same key.
/// Rejects parameters weaker than the enforced minimums.
pub fn derive_master_key(pin: &[u8], salt: &[u8], params: &Argon2Params) -> Result<[u8; KEY_LEN]> {
    if params.memory_kib < MIN_MEMORY_KIB {
        return Err(StorageError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            params.memory_kib
        )));
    }
    if params.iterations < 1 {
        return Err(StorageError::KeyDerivationFailed(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if params.parallelism < 1 {
        return Err(StorageError::KeyDerivationFailed(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| StorageError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(pin, salt, &mut key)
        .map_err(|e| StorageError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn same_pin_and_salt_give_same_key() {
        let salt = [7u8; SALT_LEN];
        let a = derive_master_key(b"1234", &salt, &fast()).unwrap();
        let b = derive_master_key(b"1234", &salt, &fast()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_pin_gives_different_key() {
        let salt = [7u8; SALT_LEN];
        let a = derive_master_key(b"1234", &salt, &fast()).unwrap();
        let b = derive_master_key(b"1235", &salt, &fast()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn weak_memory_cost_is_rejected() {
        let params = Argon2Params {
            memory_kib: 1024,
            ..fast()
        };
        let result = derive_master_key(b"1234", &[0u8; SALT_LEN], &params);
        assert!(matches!(result, Err(StorageError::KeyDerivationFailed(_))));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
