// orgvault — Runtime configuration
//
// Resolved from the process environment after `.env` has been loaded.
// Flags passed on the command line take precedence.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::keys::{key_to_hex, DbKeyProvider, PassphraseKeyProvider};
use crate::store::Database;

pub const DB_PATH_VAR: &str = "ORGVAULT_DB_PATH";
pub const PASSPHRASE_VAR: &str = "ORGVAULT_PASSPHRASE";

const DB_FILE_NAME: &str = "orgvault.db";

pub struct Config {
    pub db_path: PathBuf,
    /// When set, the database is SQLCipher-encrypted with a key derived from it.
    pub passphrase: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Default directory for orgvault data files.
fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("orgvault")
}

impl Config {
    /// Load from the process environment, with an optional path override.
    pub fn load(db_override: Option<PathBuf>) -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        if let Some(path) = db_override {
            config.db_path = path;
        }
        config
    }

    /// Build a config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = non_empty(DB_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join(DB_FILE_NAME));

        Self {
            db_path,
            passphrase: non_empty(PASSPHRASE_VAR).map(Zeroizing::new),
        }
    }

    /// Hex-encoded SQLCipher key, or `None` for an unencrypted database.
    pub fn db_key(&self) -> Result<Option<Zeroizing<String>>, VaultError> {
        let passphrase = match &self.passphrase {
            Some(p) => p.clone(),
            None => return Ok(None),
        };

        let db_name = self
            .db_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                VaultError::Config(format!("invalid database path: {}", self.db_path.display()))
            })?;

        let provider = PassphraseKeyProvider::new(passphrase, db_name)?;
        let key = provider.derive_db_key()?;
        Ok(Some(key_to_hex(&key)))
    }

    /// Create the data directory and database if missing.
    pub fn init_database(&self) -> Result<Database, VaultError> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.open_with(Database::open)
    }

    /// Open a database created earlier by `init_database`.
    pub fn open_database(&self) -> Result<Database, VaultError> {
        self.open_with(Database::open_existing)
    }

    fn open_with<F>(&self, open: F) -> Result<Database, VaultError>
    where
        F: FnOnce(&Path, Option<&str>) -> Result<Database, crate::store::StoreError>,
    {
        let key = self.db_key()?;
        let db = open(&self.db_path, key.as_ref().map(|k| k.as_str()))?;

        tracing::debug!(
            path = %self.db_path.display(),
            encrypted = key.is_some(),
            "Database opened"
        );
        Ok(db)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_to_data_dir() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert!(config.db_path.ends_with("orgvault/orgvault.db"));
        assert!(config.passphrase.is_none());
    }

    #[test]
    fn test_reads_variables_and_ignores_blank_values() {
        let config = Config::from_lookup(lookup_from(&[
            (DB_PATH_VAR, "/tmp/custom.db"),
            (PASSPHRASE_VAR, "   "),
        ]));
        assert_eq!(config.db_path, PathBuf::from("/tmp/custom.db"));
        assert!(config.passphrase.is_none());
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let config = Config::from_lookup(lookup_from(&[(PASSPHRASE_VAR, "open sesame")]));
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("open sesame"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_init_then_open_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vault.db");
        let config = Config {
            db_path: path.clone(),
            passphrase: Some(Zeroizing::new("open sesame".to_string())),
        };

        assert!(matches!(
            config.open_database(),
            Err(VaultError::Store(crate::store::StoreError::NotInitialized))
        ));

        config.init_database().unwrap();
        assert!(path.exists());
        assert!(config.open_database().is_ok());

        let wrong = Config {
            db_path: path,
            passphrase: Some(Zeroizing::new("wrong".to_string())),
        };
        assert!(matches!(
            wrong.open_database(),
            Err(VaultError::Store(crate::store::StoreError::InvalidKey))
        ));
    }
}
