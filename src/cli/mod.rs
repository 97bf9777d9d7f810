// orgvault — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, register, login, org, secret.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use zeroize::Zeroizing;

pub use commands::execute;

/// orgvault — organization-scoped password vault.
#[derive(Parser, Debug)]
#[command(name = "orgvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database file (overrides ORGVAULT_DB_PATH).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity of the user running a command; checked with `authenticate` every time.
///
/// The group id must differ from every subcommand name, or clap rejects
/// the `login` subcommand that flattens this struct.
#[derive(Args)]
#[group(id = "credentials")]
pub struct Login {
    #[arg(long, env = "ORGVAULT_EMAIL")]
    pub email: String,

    /// Prefer the environment variable to keep it out of shell history.
    #[arg(long, env = "ORGVAULT_PASSWORD", hide_env_values = true)]
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database (encrypted when ORGVAULT_PASSPHRASE is set).
    Init,

    /// Register a new user.
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[command(flatten)]
        login: Login,
    },

    /// Check an email/password pair.
    Login {
        #[command(flatten)]
        login: Login,
    },

    /// Organization and membership management.
    #[command(subcommand)]
    Org(OrgCommands),

    /// Secret entries stored under an organization.
    #[command(subcommand)]
    Secret(SecretCommands),
}

#[derive(Subcommand, Debug)]
pub enum OrgCommands {
    /// Create an organization; you become its admin.
    Create {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        login: Login,
    },

    /// List organizations you are an active member of.
    List {
        #[command(flatten)]
        login: Login,
    },

    /// List the active members of an organization.
    Members {
        #[arg(long)]
        org: i64,

        #[command(flatten)]
        login: Login,
    },

    /// Add a registered user to an organization (admins only).
    AddMember {
        #[arg(long)]
        org: i64,

        /// Email of the user to add.
        #[arg(long)]
        user: String,

        #[arg(long)]
        admin: bool,

        #[command(flatten)]
        login: Login,
    },

    /// Re-activate a member's access (admins only).
    Grant {
        #[arg(long)]
        org: i64,

        #[arg(long)]
        user: String,

        #[command(flatten)]
        login: Login,
    },

    /// Deactivate a member's access (admins only).
    Revoke {
        #[arg(long)]
        org: i64,

        #[arg(long)]
        user: String,

        #[command(flatten)]
        login: Login,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Store a new secret under an organization.
    Add {
        #[arg(long)]
        org: i64,

        #[arg(long)]
        title: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        username: String,

        /// The stored password. Prefer ORGVAULT_SECRET_VALUE to avoid shell history exposure.
        #[arg(long, env = "ORGVAULT_SECRET_VALUE", hide_env_values = true)]
        value: Zeroizing<String>,

        #[command(flatten)]
        login: Login,
    },

    /// Reveal one secret.
    Get {
        id: i64,

        #[command(flatten)]
        login: Login,
    },

    /// List an organization's secrets (passwords hidden).
    List {
        #[arg(long)]
        org: i64,

        #[command(flatten)]
        login: Login,
    },

    /// Show the access history of a secret (admins only).
    Audit {
        id: i64,

        #[command(flatten)]
        login: Login,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_subcommand() {
        let cli = Cli::try_parse_from([
            "orgvault",
            "login",
            "--email",
            "ada@example.com",
            "--password",
            "pw",
        ])
        .unwrap();

        match cli.command {
            Commands::Login { login } => {
                assert_eq!(login.email, "ada@example.com");
                assert_eq!(login.password.as_str(), "pw");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_secret_get() {
        let cli = Cli::try_parse_from([
            "orgvault",
            "--json",
            "secret",
            "get",
            "7",
            "--email",
            "ada@example.com",
            "--password",
            "pw",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Secret(SecretCommands::Get { id, login }) => {
                assert_eq!(id, 7);
                assert_eq!(login.email, "ada@example.com");
                assert_eq!(login.password.as_str(), "pw");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_add_member_defaults_to_non_admin() {
        let cli = Cli::try_parse_from([
            "orgvault",
            "org",
            "add-member",
            "--org",
            "3",
            "--user",
            "bob@example.com",
            "--email",
            "ada@example.com",
            "--password",
            "pw",
        ])
        .unwrap();

        match cli.command {
            Commands::Org(OrgCommands::AddMember { org, user, admin, .. }) => {
                assert_eq!(org, 3);
                assert_eq!(user, "bob@example.com");
                assert!(!admin);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
