// orgvault — Password hashing
//
// bcrypt with a per-hash random salt. Verification compares digests in
// constant time inside the bcrypt crate.

use bcrypt::{hash, verify, DEFAULT_COST};

/// Work factor for stored user passwords.
pub const HASH_COST: u32 = DEFAULT_COST;

/// bcrypt only reads this many bytes of input; anything after is ignored.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Callers must reject passwords longer than `MAX_PASSWORD_BYTES` first.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Over-long candidates never match, even when their first 72 bytes do.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_cost_is_twelve() {
        assert_eq!(HASH_COST, 12);
        let hashed = hash_password("correct horse", HASH_COST).unwrap();
        assert!(hashed.starts_with("$2b$12$"), "unexpected hash prefix: {}", hashed);
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("same", 4).unwrap();
        let b = hash_password("same", 4).unwrap();
        assert_ne!(a, b, "Two hashes of the same password must differ");
        assert!(verify_password("same", &a).unwrap());
        assert!(verify_password("same", &b).unwrap());
    }

    #[test]
    fn test_verify_rejects_other_strings() {
        let hashed = hash_password("s3cret", 4).unwrap();
        assert!(!verify_password("s3cret ", &hashed).unwrap());
        assert!(!verify_password("", &hashed).unwrap());
    }

    #[test]
    fn test_verify_rejects_candidate_past_bcrypt_limit() {
        let stored = "a".repeat(MAX_PASSWORD_BYTES);
        let hashed = hash_password(&stored, 4).unwrap();
        assert!(verify_password(&stored, &hashed).unwrap());

        let longer = format!("{}anything", stored);
        assert!(!verify_password(&longer, &hashed).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash_is_error() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
