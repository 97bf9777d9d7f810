// orgvault — Application Entry Point
//
// Loads `.env`, initializes structured logging (to stderr, so `--json`
// output stays clean), parses CLI arguments and dispatches to the handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use orgvault::cli::{execute, Cli};
use orgvault::VaultError;

fn main() {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    // RUST_LOG=orgvault=debug for verbose output. No level ever includes
    // passwords or secret values.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orgvault=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        if let VaultError::Store(store_err) = &e {
            tracing::error!(error = %store_err, "Store operation failed");
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
