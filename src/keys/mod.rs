// orgvault — Key Module
//
// Derives the SQLCipher database key from an operator passphrase with
// Argon2id. The passphrase and derived key are zeroized on drop.

mod error;
mod provider;

pub use error::KeyError;
pub use provider::{key_to_hex, DbKeyProvider, PassphraseKeyProvider};
