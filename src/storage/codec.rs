//! Typed record codecs.
//!
//! A `Field<C>` names one record (namespace, key, domain) and fixes its
//! encoding through the codec type `C`, so a field can only be read and
//! written with the type it was declared with.
//!
//! Integers are fixed-width big-endian.  An absent or zero-length
//! integer record decodes to `None`, never to zero.  Any other length
//! is `Corrupted`.
//!
//! `Flag` is a tagged optional boolean: `0x01` is true, anything else
//! (including absence) reads as false.  `set_true_or_delete(false)`
//! removes the record, so "explicitly false" and "never set" share one
//! representation.

use std::marker::PhantomData;

use crate::errors::{Result, StorageError};
use crate::vault::{Domain, RecordKey, Vault};

use super::schema::Namespace;

const TRUE_BYTE: u8 = 0x01;
const FALSE_BYTE: u8 = 0x00;

/// Encoding of a field's value into record bytes.
pub trait Codec {
    type Value;

    fn encode(value: &Self::Value) -> Vec<u8>;

    /// Decode stored bytes; `Ok(None)` means "treat as absent".
    fn decode(record: RecordKey, bytes: Vec<u8>) -> Result<Option<Self::Value>>;
}

/// Opaque bytes, stored verbatim.  Empty is a value, not absence.
pub enum Bytes {}

/// UTF-8 text, stored verbatim.
pub enum Text {}

/// Presence-as-boolean.
pub enum Flag {}

pub enum U8 {}
pub enum U16 {}
pub enum U32 {}

impl Codec for Bytes {
    type Value = Vec<u8>;

    fn encode(value: &Vec<u8>) -> Vec<u8> {
        value.clone()
    }

    fn decode(_record: RecordKey, bytes: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(Some(bytes))
    }
}

impl Codec for Text {
    type Value = String;

    fn encode(value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn decode(record: RecordKey, bytes: Vec<u8>) -> Result<Option<String>> {
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| corrupted(record, "text record is not valid UTF-8".into()))
    }
}

impl Codec for Flag {
    type Value = bool;

    fn encode(value: &bool) -> Vec<u8> {
        vec![if *value { TRUE_BYTE } else { FALSE_BYTE }]
    }

    fn decode(_record: RecordKey, bytes: Vec<u8>) -> Result<Option<bool>> {
        Ok(Some(bytes == [TRUE_BYTE]))
    }
}

macro_rules! fixed_width_codec {
    ($codec:ty, $int:ty) => {
        impl Codec for $codec {
            type Value = $int;

            fn encode(value: &$int) -> Vec<u8> {
                value.to_be_bytes().to_vec()
            }

            fn decode(record: RecordKey, bytes: Vec<u8>) -> Result<Option<$int>> {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let raw: [u8; std::mem::size_of::<$int>()] =
                    bytes.as_slice().try_into().map_err(|_| {
                        corrupted(
                            record,
                            format!(
                                "expected {} bytes, found {}",
                                std::mem::size_of::<$int>(),
                                bytes.len()
                            ),
                        )
                    })?;
                Ok(Some(<$int>::from_be_bytes(raw)))
            }
        }
    };
}

fixed_width_codec!(U8, u8);
fixed_width_codec!(U16, u16);
fixed_width_codec!(U32, u32);

fn corrupted(record: RecordKey, reason: String) -> StorageError {
    StorageError::Corrupted {
        namespace: record.namespace,
        key: record.key,
        reason,
    }
}

/// A typed record in a namespace.
pub struct Field<C> {
    namespace: Namespace,
    key: u8,
    domain: Domain,
    codec: PhantomData<fn() -> C>,
}

impl<C> Clone for Field<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Field<C> {}

impl<C> std::fmt::Debug for Field<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .field("domain", &self.domain)
            .finish()
    }
}

impl<C> Field<C> {
    pub const fn new(namespace: Namespace, key: u8, domain: Domain) -> Self {
        Self {
            namespace,
            key,
            domain,
            codec: PhantomData,
        }
    }

    pub const fn record(&self) -> RecordKey {
        RecordKey::new(self.namespace as u8, self.key, self.domain)
    }

    pub fn get_raw<V: Vault + ?Sized>(&self, vault: &V) -> Result<Option<Vec<u8>>> {
        vault.get(self.record())
    }

    pub fn set_raw<V: Vault + ?Sized>(&self, vault: &mut V, bytes: &[u8]) -> Result<()> {
        vault.set(self.record(), bytes)
    }

    pub fn delete<V: Vault + ?Sized>(&self, vault: &mut V) -> Result<()> {
        vault.delete(self.record())
    }
}

impl<C: Codec> Field<C> {
    pub fn get<V: Vault + ?Sized>(&self, vault: &V) -> Result<Option<C::Value>> {
        match vault.get(self.record())? {
            Some(bytes) => C::decode(self.record(), bytes),
            None => Ok(None),
        }
    }

    pub fn set<V: Vault + ?Sized>(&self, vault: &mut V, value: &C::Value) -> Result<()> {
        vault.set(self.record(), &C::encode(value))
    }
}

impl Field<Flag> {
    /// Absent records read as `false`.
    pub fn get_bool<V: Vault + ?Sized>(&self, vault: &V) -> Result<bool> {
        Ok(self.get(vault)?.unwrap_or(false))
    }

    pub fn set_bool<V: Vault + ?Sized>(&self, vault: &mut V, value: bool) -> Result<()> {
        self.set(vault, &value)
    }

    pub fn set_true_or_delete<V: Vault + ?Sized>(&self, vault: &mut V, value: bool) -> Result<()> {
        if value {
            self.set(vault, &true)
        } else {
            self.delete(vault)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    const FLAG: Field<Flag> = Field::new(Namespace::Device, 0x05, Domain::Private);
    const NUMBER: Field<U16> = Field::new(Namespace::Device, 0x0F, Domain::Public);
    const WORD: Field<U32> = Field::new(Namespace::Device, 0x08, Domain::Private);
    const NAME: Field<Text> = Field::new(Namespace::Device, 0x04, Domain::Public);

    #[test]
    fn false_and_never_set_are_indistinguishable() {
        let mut vault = MemoryVault::new();
        assert!(!FLAG.get_bool(&vault).unwrap());

        FLAG.set_true_or_delete(&mut vault, true).unwrap();
        assert!(FLAG.get_bool(&vault).unwrap());

        FLAG.set_true_or_delete(&mut vault, false).unwrap();
        assert!(!FLAG.get_bool(&vault).unwrap());
        assert!(!vault.contains(FLAG.record()));
    }

    #[test]
    fn explicit_false_byte_reads_false() {
        let mut vault = MemoryVault::new();
        FLAG.set_bool(&mut vault, false).unwrap();
        assert_eq!(FLAG.get_raw(&vault).unwrap(), Some(vec![FALSE_BYTE]));
        assert!(!FLAG.get_bool(&vault).unwrap());
    }

    #[test]
    fn integers_are_big_endian() {
        let mut vault = MemoryVault::new();
        NUMBER.set(&mut vault, &270).unwrap();
        WORD.set(&mut vault, &0x0102_0304).unwrap();

        assert_eq!(NUMBER.get_raw(&vault).unwrap(), Some(vec![0x01, 0x0E]));
        assert_eq!(WORD.get_raw(&vault).unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(NUMBER.get(&vault).unwrap(), Some(270));
    }

    #[test]
    fn empty_integer_record_is_absent_not_zero() {
        let mut vault = MemoryVault::new();
        assert_eq!(NUMBER.get(&vault).unwrap(), None);

        NUMBER.set_raw(&mut vault, &[]).unwrap();
        assert_eq!(NUMBER.get(&vault).unwrap(), None);
    }

    #[test]
    fn wrong_width_is_corruption() {
        let mut vault = MemoryVault::new();
        NUMBER.set_raw(&mut vault, &[1, 2, 3]).unwrap();
        assert!(matches!(
            NUMBER.get(&vault),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn empty_text_is_a_value() {
        let mut vault = MemoryVault::new();
        NAME.set(&mut vault, &String::new()).unwrap();
        assert_eq!(NAME.get(&vault).unwrap(), Some(String::new()));
    }
}
