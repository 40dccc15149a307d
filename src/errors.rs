use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in the wallet storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: record tampered or key mismatch")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("HMAC error: {0}")]
    HmacError(String),

    // --- Vault errors ---
    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    VaultAlreadyExists(PathBuf),

    #[error("Invalid vault format: {0}")]
    InvalidVaultFormat(String),

    #[error("Wrong PIN")]
    WrongPin,

    #[error("Storage is locked: private records require unlock")]
    Locked,

    // --- Domain errors ---
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Corrupted record {namespace:#04x}/{key:#04x}: {reason}")]
    Corrupted {
        namespace: u8,
        key: u8,
        reason: String,
    },

    #[error("No recovery session in progress")]
    RecoveryNotInProgress,

    #[error("Counter {namespace:#04x}/{key:#04x} exhausted")]
    CounterExhausted { namespace: u8, key: u8 },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, StorageError>;
