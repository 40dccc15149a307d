//! Device settings, secrets and the U2F counter.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::{Result, StorageError};
use crate::vault::Vault;

use super::migration;
use super::schema;

/// Homescreen images must start with this TOIf header (144x144, gray).
pub const HOMESCREEN_MAGIC: &[u8; 8] = b"TOIf\x90\x00\x90\x00";

/// Largest accepted homescreen image in bytes.
pub const HOMESCREEN_MAXSIZE: usize = 16384;

pub const AUTOLOCK_DELAY_DEFAULT_MS: u32 = 10 * 60 * 1000;
pub const AUTOLOCK_DELAY_MINIMUM_MS: u32 = 60 * 1000;

/// Display rotations in degrees the device supports.
pub const SUPPORTED_ROTATIONS: [u16; 4] = [0, 90, 180, 270];

const DEVICE_ID_LEN: usize = 12;

/// Kind of seed stored in the mnemonic secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MnemonicType {
    Bip39 = 0,
    Slip39 = 1,
}

impl TryFrom<u8> for MnemonicType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(Self::Bip39),
            1 => Ok(Self::Slip39),
            other => Err(other),
        }
    }
}

/// Where the passphrase is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PassphraseSource {
    #[default]
    Ask = 0,
    Device = 1,
    Host = 2,
}

impl TryFrom<u8> for PassphraseSource {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(Self::Ask),
            1 => Ok(Self::Device),
            2 => Ok(Self::Host),
            other => Err(other),
        }
    }
}

/// Optional settings applied together by `load_settings`.
///
/// `None` leaves a setting untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub label: Option<String>,
    pub use_passphrase: Option<bool>,
    pub homescreen: Option<Vec<u8>>,
    /// Raw source value; anything outside 0..=2 is ignored.
    pub passphrase_source: Option<u8>,
    /// Degrees; anything but 0, 90, 180 or 270 is rejected.
    pub display_rotation: Option<u16>,
}

/// Typed accessors for the device namespace.
pub struct DeviceSettings<'a, V: Vault + ?Sized> {
    vault: &'a mut V,
}

impl<'a, V: Vault + ?Sized> DeviceSettings<'a, V> {
    pub fn new(vault: &'a mut V) -> Self {
        Self { vault }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Device id, generated from the thread RNG on first read.
    pub fn device_id(&mut self) -> Result<String> {
        self.device_id_with(&mut rand::rng())
    }

    /// Device id, generating it from `rng` on first read.
    ///
    /// Once persisted the id never changes.
    pub fn device_id_with<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> Result<String> {
        if let Some(id) = schema::DEVICE_ID.get(self.vault)? {
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let mut raw = [0u8; DEVICE_ID_LEN];
        rng.fill_bytes(&mut raw);
        let id: String = raw.iter().map(|b| format!("{b:02X}")).collect();

        schema::DEVICE_ID.set(self.vault, &id)?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Public settings
    // ------------------------------------------------------------------

    pub fn label(&self) -> Result<Option<String>> {
        schema::LABEL.get(self.vault)
    }

    /// Custom homescreen image; `None` means the default image.
    pub fn homescreen(&self) -> Result<Option<Vec<u8>>> {
        Ok(schema::HOMESCREEN
            .get(self.vault)?
            .filter(|image| !image.is_empty()))
    }

    /// Display rotation in degrees, 0 when unset.
    pub fn rotation(&self) -> Result<u16> {
        Ok(schema::ROTATION.get(self.vault)?.unwrap_or(0))
    }

    /// Apply several settings at once.
    ///
    /// Everything is validated before anything is written: an unsupported
    /// rotation fails with `InvalidArgument` and no setting changes.
    pub fn load_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        if let Some(rotation) = update.display_rotation {
            if !SUPPORTED_ROTATIONS.contains(&rotation) {
                return Err(StorageError::InvalidArgument(format!(
                    "Unsupported display rotation degrees: {rotation}"
                )));
            }
        }

        if let Some(label) = update.label {
            schema::LABEL.set(self.vault, &label)?;
        }
        if let Some(use_passphrase) = update.use_passphrase {
            schema::USE_PASSPHRASE.set_bool(self.vault, use_passphrase)?;
        }
        if let Some(homescreen) = update.homescreen {
            self.set_homescreen(homescreen)?;
        }
        if let Some(source) = update.passphrase_source {
            match PassphraseSource::try_from(source) {
                Ok(source) => schema::PASSPHRASE_SOURCE.set(self.vault, &(source as u8))?,
                // Unknown sources leave the stored value untouched.
                Err(source) => tracing::warn!(source, "ignoring unknown passphrase source"),
            }
        }
        if let Some(rotation) = update.display_rotation {
            schema::ROTATION.set(self.vault, &rotation)?;
        }
        Ok(())
    }

    fn set_homescreen(&mut self, image: Vec<u8>) -> Result<()> {
        if image.starts_with(HOMESCREEN_MAGIC) && image.len() <= HOMESCREEN_MAXSIZE {
            schema::HOMESCREEN.set(self.vault, &image)
        } else {
            tracing::warn!(len = image.len(), "rejected homescreen image, clearing");
            schema::HOMESCREEN.delete(self.vault)
        }
    }

    // ------------------------------------------------------------------
    // Private settings
    // ------------------------------------------------------------------

    pub fn has_passphrase(&self) -> Result<bool> {
        schema::USE_PASSPHRASE.get_bool(self.vault)
    }

    /// Stored passphrase source; unknown stored values read as `Ask`.
    pub fn passphrase_source(&self) -> Result<PassphraseSource> {
        Ok(schema::PASSPHRASE_SOURCE
            .get(self.vault)?
            .and_then(|raw| PassphraseSource::try_from(raw).ok())
            .unwrap_or_default())
    }

    pub fn autolock_delay_ms(&self) -> Result<u32> {
        Ok(schema::AUTOLOCK_DELAY_MS
            .get(self.vault)?
            .unwrap_or(AUTOLOCK_DELAY_DEFAULT_MS))
    }

    /// Store the autolock delay, raising it to at least one minute.
    pub fn set_autolock_delay_ms(&mut self, delay_ms: u32) -> Result<()> {
        let delay_ms = delay_ms.max(AUTOLOCK_DELAY_MINIMUM_MS);
        schema::AUTOLOCK_DELAY_MS.set(self.vault, &delay_ms)
    }

    pub fn flags(&self) -> Result<u32> {
        Ok(schema::FLAGS.get(self.vault)?.unwrap_or(0))
    }

    /// Merge `flags` into the stored flags.  Flags are never cleared.
    ///
    /// Nothing is written when no new bit would be set.
    pub fn set_flags(&mut self, flags: u32) -> Result<()> {
        let stored = self.flags()?;
        let merged = stored | flags;
        if merged != stored {
            schema::FLAGS.set(self.vault, &merged)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secret and backup state
    // ------------------------------------------------------------------

    pub fn mnemonic_secret(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(schema::MNEMONIC_SECRET.get(self.vault)?.map(Zeroizing::new))
    }

    pub fn mnemonic_type(&self) -> Result<Option<MnemonicType>> {
        let record = schema::MNEMONIC_TYPE.record();
        schema::MNEMONIC_TYPE
            .get(self.vault)?
            .map(|raw| {
                MnemonicType::try_from(raw).map_err(|raw| StorageError::Corrupted {
                    namespace: record.namespace,
                    key: record.key,
                    reason: format!("unknown mnemonic type {raw}"),
                })
            })
            .transpose()
    }

    /// Store the seed and its backup state.
    ///
    /// The secret is written after its metadata and the version tag is
    /// stamped last, so an interrupted store never leaves a device that
    /// reads as initialized with a partial secret.
    pub fn store_mnemonic_secret(
        &mut self,
        secret: &[u8],
        mnemonic_type: MnemonicType,
        needs_backup: bool,
        no_backup: bool,
    ) -> Result<()> {
        schema::MNEMONIC_TYPE.set(self.vault, &(mnemonic_type as u8))?;
        schema::NO_BACKUP.set_true_or_delete(self.vault, no_backup)?;
        schema::NEEDS_BACKUP.set_true_or_delete(self.vault, needs_backup && !no_backup)?;
        schema::MNEMONIC_SECRET.set_raw(self.vault, secret)?;
        migration::stamp_current(self.vault)?;

        tracing::info!(?mnemonic_type, needs_backup, no_backup, "mnemonic secret stored");
        Ok(())
    }

    pub fn needs_backup(&self) -> Result<bool> {
        schema::NEEDS_BACKUP.get_bool(self.vault)
    }

    pub fn set_backed_up(&mut self) -> Result<()> {
        schema::NEEDS_BACKUP.delete(self.vault)
    }

    pub fn no_backup(&self) -> Result<bool> {
        schema::NO_BACKUP.get_bool(self.vault)
    }

    pub fn unfinished_backup(&self) -> Result<bool> {
        schema::UNFINISHED_BACKUP.get_bool(self.vault)
    }

    pub fn set_unfinished_backup(&mut self, state: bool) -> Result<()> {
        schema::UNFINISHED_BACKUP.set_true_or_delete(self.vault, state)
    }

    // ------------------------------------------------------------------
    // U2F counter (public, usable while locked)
    // ------------------------------------------------------------------

    pub fn next_u2f_counter(&mut self) -> Result<u32> {
        self.vault.next_counter(schema::U2F_COUNTER)
    }

    /// Reset the counter so the next allocation returns `count + 1`.
    ///
    /// `None` clears it entirely; the next allocation then returns 0.
    pub fn set_u2f_counter(&mut self, count: Option<u32>) -> Result<()> {
        match count {
            Some(count) => self.vault.set_counter(schema::U2F_COUNTER, count),
            None => self.vault.delete(schema::U2F_COUNTER),
        }
    }
}
