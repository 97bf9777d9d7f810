// orgvault — Library root
//
// Re-exports the store, key, config and CLI modules.

pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod store;

pub use error::{Result, VaultError};
