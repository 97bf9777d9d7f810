// orgvault — Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Unique or primary-key violation on insert (e.g. duplicate email).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Password is {0} bytes; at most 72 are allowed")]
    PasswordTooLong(usize),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Database not initialized — run `orgvault init` first")]
    NotInitialized,

    #[error("Invalid database key — database may be corrupted or passphrase is wrong")]
    InvalidKey,
}

impl StoreError {
    /// Map a constraint violation to `Conflict`, pass everything else through.
    pub(crate) fn from_insert(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                StoreError::Conflict(what.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}
