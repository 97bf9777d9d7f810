// orgvault — Key error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
}
