//! Storage version tag and schema migrations.
//!
//! The version tag is a single private byte.  Absence means the device
//! was never initialized; it is stamped when a secret is first stored.
//! Tags above `STORAGE_VERSION_CURRENT` come from newer firmware and are
//! left alone.
//!
//! Each `MigrationStep` upgrades exactly one version to the next.  Steps
//! stamp their target version only after all their record changes are
//! done, so a step interrupted by power loss simply runs again in full
//! on the next unlock.

use crate::errors::Result;
use crate::vault::Vault;

use super::schema;

pub const STORAGE_VERSION_01: u8 = 0x01;
pub const STORAGE_VERSION_CURRENT: u8 = 0x02;

/// One idempotent upgrade between consecutive storage versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// 0x01 → 0x02: make the U2F counter public so it works while locked.
    PublicU2fCounter,
}

impl MigrationStep {
    /// The step that upgrades `version`, if any.
    pub fn for_version(version: u8) -> Option<Self> {
        match version {
            STORAGE_VERSION_01 => Some(Self::PublicU2fCounter),
            _ => None,
        }
    }

    pub fn target_version(self) -> u8 {
        match self {
            Self::PublicU2fCounter => 0x02,
        }
    }

    fn apply<V: Vault + ?Sized>(self, vault: &mut V) -> Result<()> {
        match self {
            Self::PublicU2fCounter => move_u2f_counter_to_public(vault),
        }
    }
}

fn move_u2f_counter_to_public<V: Vault + ?Sized>(vault: &mut V) -> Result<()> {
    if let Some(legacy) = schema::LEGACY_U2F_COUNTER.get(vault)? {
        // A rerun after a crash may find a public counter that already
        // advanced while locked; never move it backwards.
        let count = match vault.peek_counter(schema::U2F_COUNTER)? {
            Some(next) if next > 0 => legacy.max(next - 1),
            _ => legacy,
        };
        vault.set_counter(schema::U2F_COUNTER, count)?;
        schema::LEGACY_U2F_COUNTER.delete(vault)?;
        tracing::info!(count, "u2f counter moved to public domain");
    }
    Ok(())
}

/// Stored version tag, `None` on a fresh device.
pub fn version<V: Vault + ?Sized>(vault: &V) -> Result<Option<u8>> {
    schema::VERSION.get(vault)
}

pub fn is_version_stored<V: Vault + ?Sized>(vault: &V) -> Result<bool> {
    Ok(version(vault)?.is_some())
}

pub(crate) fn stamp_current<V: Vault + ?Sized>(vault: &mut V) -> Result<()> {
    schema::VERSION.set(vault, &STORAGE_VERSION_CURRENT)
}

/// Run every step needed to bring the stored version up to date.
///
/// Returns the steps that ran, in order.  A fresh device (no tag) and
/// a device at or above the current version run nothing.
pub fn run_pending<V: Vault + ?Sized>(vault: &mut V) -> Result<Vec<MigrationStep>> {
    let mut applied = Vec::new();
    let Some(mut current) = version(vault)? else {
        return Ok(applied);
    };

    while let Some(step) = MigrationStep::for_version(current) {
        tracing::debug!(from = current, ?step, "running storage migration");
        step.apply(vault)?;
        current = step.target_version();
        schema::VERSION.set(vault, &current)?;
        applied.push(step);
    }

    Ok(applied)
}
