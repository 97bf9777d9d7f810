// orgvault — Database Key Provider
//
// Flow:
//   1. The operator supplies a passphrase (ORGVAULT_PASSPHRASE)
//   2. `derive_db_key()` runs Argon2id over it with a salt bound to the database file name
//   3. The hex-encoded key is handed to SQLCipher via `PRAGMA key`, then dropped and zeroized

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::KeyError;

/// Label mixed into every salt so keys are never shared with other tools.
const SALT_LABEL: &str = "orgvault-db";

/// Length of the derived database key in bytes (256-bit for AES-256).
const DERIVED_KEY_LEN: usize = 32;

// Argon2id parameters: m=65536 (64 MiB), t=3, p=4
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

/// Source of the database encryption key.
pub trait DbKeyProvider {
    fn derive_db_key(&self) -> Result<Zeroizing<Vec<u8>>, KeyError>;
}

/// Derives the key from a passphrase held in memory only as long as the provider.
pub struct PassphraseKeyProvider {
    passphrase: Zeroizing<String>,
    db_name: String,
}

impl PassphraseKeyProvider {
    /// `db_name` is the database file name; it scopes the salt so the same
    /// passphrase yields different keys for different vault files.
    pub fn new(passphrase: Zeroizing<String>, db_name: &str) -> Result<Self, KeyError> {
        if passphrase.is_empty() {
            return Err(KeyError::EmptyPassphrase);
        }
        Ok(Self {
            passphrase,
            db_name: db_name.to_string(),
        })
    }

    /// Salt = SHA-256(SALT_LABEL || "::" || db_name)
    fn build_salt(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(SALT_LABEL.as_bytes());
        hasher.update(b"::");
        hasher.update(self.db_name.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl DbKeyProvider for PassphraseKeyProvider {
    fn derive_db_key(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let salt = self.build_salt();

        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(DERIVED_KEY_LEN))
            .map_err(|e| KeyError::Derivation(format!("invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut derived_key = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
        argon2
            .hash_password_into(self.passphrase.as_bytes(), &salt, &mut derived_key)
            .map_err(|e| KeyError::Derivation(format!("Argon2id hash failed: {}", e)))?;

        tracing::debug!("Derived database key from passphrase");
        Ok(derived_key)
    }
}

/// Convert key bytes to the hex string format SQLCipher expects.
pub fn key_to_hex(key: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(key.iter().map(|b| format!("{:02x}", b)).collect())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(passphrase: &str, db_name: &str) -> PassphraseKeyProvider {
        PassphraseKeyProvider::new(Zeroizing::new(passphrase.to_string()), db_name).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let key1 = provider("open sesame", "vault.db").derive_db_key().unwrap();
        let key2 = provider("open sesame", "vault.db").derive_db_key().unwrap();
        assert_eq!(key1.as_slice(), key2.as_slice());
        assert_eq!(key1.len(), DERIVED_KEY_LEN);
    }

    #[test]
    fn test_different_passphrases_produce_different_keys() {
        let a = provider("open sesame", "vault.db").derive_db_key().unwrap();
        let b = provider("close sesame", "vault.db").derive_db_key().unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_salt_is_scoped_to_db_name() {
        let a = provider("open sesame", "a.db").derive_db_key().unwrap();
        let b = provider("open sesame", "b.db").derive_db_key().unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let result = PassphraseKeyProvider::new(Zeroizing::new(String::new()), "vault.db");
        assert!(matches!(result, Err(KeyError::EmptyPassphrase)));
    }

    #[test]
    fn test_key_to_hex() {
        assert_eq!(key_to_hex(&[0x00, 0xab, 0x1f]).as_str(), "00ab1f");
        let key = provider("open sesame", "vault.db").derive_db_key().unwrap();
        assert_eq!(key_to_hex(&key).len(), DERIVED_KEY_LEN * 2);
    }
}
