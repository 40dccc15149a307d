//! Typed storage on top of a `Vault`.
//!
//! This module provides:
//! - Typed record codecs and the `Field` schema (`codec`, `schema`)
//! - Device settings, secrets and the U2F counter (`device`)
//! - The multi-share recovery session (`recovery`)
//! - Version tags and migrations (`migration`)
//! - `Storage`, which owns the vault and coordinates wipe and unlock

pub mod codec;
pub mod device;
pub mod migration;
pub mod recovery;
pub mod schema;

use crate::errors::Result;
use crate::vault::Vault;

pub use device::{DeviceSettings, MnemonicType, PassphraseSource, SettingsUpdate};
pub use migration::MigrationStep;
pub use recovery::{RecoverySession, Shares};

type WipeHook = Box<dyn FnMut()>;

/// Owner of the vault and entry point for the rest of the firmware.
pub struct Storage<V: Vault> {
    vault: V,
    wipe_hooks: Vec<WipeHook>,
}

impl<V: Vault> Storage<V> {
    pub fn new(vault: V) -> Self {
        Self {
            vault,
            wipe_hooks: Vec::new(),
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Direct vault access, e.g. to lock or unlock it.
    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    pub fn into_vault(self) -> V {
        self.vault
    }

    pub fn device(&mut self) -> DeviceSettings<'_, V> {
        DeviceSettings::new(&mut self.vault)
    }

    pub fn recovery(&mut self) -> RecoverySession<'_, V> {
        RecoverySession::new(&mut self.vault)
    }

    /// Register a callback that drops an in-memory cache derived from
    /// storage.  Every callback runs on each `wipe`.
    pub fn on_wipe<F>(&mut self, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.wipe_hooks.push(Box::new(hook));
    }

    /// A device is initialized once a secret was stored and no
    /// recovery is still running.
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(migration::is_version_stored(&self.vault)?
            && !schema::RECOVERY_IN_PROGRESS.get_bool(&self.vault)?)
    }

    /// Stored storage version, `None` on a fresh device.
    pub fn version(&self) -> Result<Option<u8>> {
        migration::version(&self.vault)
    }

    /// Bring the stored layout up to date.  Call right after unlock.
    ///
    /// A failed migration is not retried here; it runs again in full on
    /// the next unlock.
    pub fn run_pending_migration(&mut self) -> Result<Vec<MigrationStep>> {
        let applied = migration::run_pending(&mut self.vault)?;
        if !applied.is_empty() {
            tracing::info!(steps = applied.len(), "storage migrated");
        }
        Ok(applied)
    }

    /// Erase the vault and invalidate every registered cache.
    ///
    /// Caches are invalidated even when the vault wipe fails, so no
    /// stale value outlives a wipe attempt.
    pub fn wipe(&mut self) -> Result<()> {
        let result = self.vault.wipe();
        for hook in &mut self.wipe_hooks {
            hook();
        }
        match &result {
            Ok(()) => tracing::info!(caches = self.wipe_hooks.len(), "storage wiped"),
            Err(e) => tracing::warn!(error = %e, "vault wipe failed"),
        }
        result
    }
}
