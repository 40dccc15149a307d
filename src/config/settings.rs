use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{Result, StorageError};

/// Host-side storage configuration, loaded from `.wallet-storage.toml`.
///
/// Every field has a default so no config file is needed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Vault file name, relative to the data directory.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Argon2 memory cost in KiB for PIN stretching (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    "device.vault".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl StorageConfig {
    const FILE_NAME: &'static str = ".wallet-storage.toml";

    /// Load the config from `<data_dir>/.wallet-storage.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let config: StorageConfig = toml::from_str(&contents).map_err(|e| {
            StorageError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        tracing::debug!(path = %config_path.display(), "loaded storage config");
        Ok(config)
    }

    /// Full path of the vault file inside `data_dir`.
    pub fn vault_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.vault_file)
    }

    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
