//! Persisted layout: namespaces, key ids and their typed fields.
//!
//! Key ids are part of the on-device format and must never be reused
//! for a different meaning.

use crate::vault::{Domain, RecordKey};

use super::codec::{Bytes, Field, Flag, Text, U16, U32, U8};

/// Record namespaces.  A (namespace, key) pair is globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Namespace {
    /// Device settings and secrets.
    Device = 0x01,
    /// Metadata of an in-progress share recovery.
    Recovery = 0x02,
    /// Collected share mnemonics, keyed by share index.
    RecoveryShares = 0x03,
}

// Device namespace.
pub const DEVICE_ID: Field<Text> = Field::new(Namespace::Device, 0x00, Domain::Public);
pub const VERSION: Field<U8> = Field::new(Namespace::Device, 0x01, Domain::Private);
pub const MNEMONIC_SECRET: Field<Bytes> = Field::new(Namespace::Device, 0x02, Domain::Private);
// 0x03 held the display language on older firmware.
pub const LABEL: Field<Text> = Field::new(Namespace::Device, 0x04, Domain::Public);
pub const USE_PASSPHRASE: Field<Flag> = Field::new(Namespace::Device, 0x05, Domain::Private);
pub const HOMESCREEN: Field<Bytes> = Field::new(Namespace::Device, 0x06, Domain::Public);
pub const NEEDS_BACKUP: Field<Flag> = Field::new(Namespace::Device, 0x07, Domain::Private);
pub const FLAGS: Field<U32> = Field::new(Namespace::Device, 0x08, Domain::Private);
pub const U2F_COUNTER: RecordKey = RecordKey::new(Namespace::Device as u8, 0x09, Domain::Public);
/// Pre-0x02 layout kept the U2F counter private.
pub const LEGACY_U2F_COUNTER: Field<U32> = Field::new(Namespace::Device, 0x09, Domain::Private);
pub const PASSPHRASE_SOURCE: Field<U8> = Field::new(Namespace::Device, 0x0A, Domain::Private);
pub const UNFINISHED_BACKUP: Field<Flag> = Field::new(Namespace::Device, 0x0B, Domain::Private);
pub const AUTOLOCK_DELAY_MS: Field<U32> = Field::new(Namespace::Device, 0x0C, Domain::Private);
pub const NO_BACKUP: Field<Flag> = Field::new(Namespace::Device, 0x0D, Domain::Private);
pub const MNEMONIC_TYPE: Field<U8> = Field::new(Namespace::Device, 0x0E, Domain::Private);
pub const ROTATION: Field<U16> = Field::new(Namespace::Device, 0x0F, Domain::Public);

// Recovery namespace.
pub const RECOVERY_IN_PROGRESS: Field<Flag> = Field::new(Namespace::Recovery, 0x00, Domain::Private);
pub const RECOVERY_IDENTIFIER: Field<U16> = Field::new(Namespace::Recovery, 0x01, Domain::Private);
pub const RECOVERY_THRESHOLD: Field<U8> = Field::new(Namespace::Recovery, 0x02, Domain::Private);
pub const RECOVERY_REMAINING: Field<U8> = Field::new(Namespace::Recovery, 0x03, Domain::Private);
pub const RECOVERY_WORDS_COUNT: Field<U8> = Field::new(Namespace::Recovery, 0x04, Domain::Private);
pub const RECOVERY_ITERATION_EXPONENT: Field<U8> =
    Field::new(Namespace::Recovery, 0x05, Domain::Private);

/// Upper bound (exclusive) on share indices.
pub const MAX_SHARE_COUNT: u8 = 16;

/// Share mnemonic stored under `index`.
pub const fn share(index: u8) -> Field<Text> {
    Field::new(Namespace::RecoveryShares, index, Domain::Private)
}
