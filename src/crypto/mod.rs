//! Cryptographic primitives backing the file vault.
//!
//! This module provides:
//! - AES-256-GCM record encryption with address binding (`encryption`)
//! - Argon2id PIN stretching (`kdf`)
//! - HKDF per-record keys and the HMAC PIN verifier (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_master_key, generate_salt, Argon2Params};
pub use keys::{derive_record_key, MasterKey};
