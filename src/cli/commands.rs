// orgvault — CLI Command Handlers
//
// Each function handles one CLI subcommand. They authenticate the acting
// user with `--email/--password`, then call the access-scoped store.

use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::error::VaultError;
use crate::store::{
    AccessStore, Lookup, NewOrganization, NewSecretEntry, NewUser, SqliteAccessStore, User,
};

use super::{Cli, Commands, Login, OrgCommands, SecretCommands};

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<(), VaultError> {
    let config = Config::load(cli.db);
    let json = cli.json;

    match cli.command {
        Commands::Init => cmd_init(&config, json),
        Commands::Register {
            first_name,
            last_name,
            login,
        } => cmd_register(&config, json, first_name, last_name, login),
        Commands::Login { login } => cmd_login(&config, json, login),
        Commands::Org(org) => execute_org(&config, json, org),
        Commands::Secret(secret) => execute_secret(&config, json, secret),
    }
}

fn execute_org(config: &Config, json: bool, command: OrgCommands) -> Result<(), VaultError> {
    match command {
        OrgCommands::Create { name, login } => cmd_org_create(config, json, name, login),
        OrgCommands::List { login } => cmd_org_list(config, json, login),
        OrgCommands::Members { org, login } => cmd_org_members(config, json, org, login),
        OrgCommands::AddMember {
            org,
            user,
            admin,
            login,
        } => cmd_org_add_member(config, json, org, user, admin, login),
        OrgCommands::Grant { org, user, login } => {
            cmd_org_set_active(config, json, org, user, true, login)
        }
        OrgCommands::Revoke { org, user, login } => {
            cmd_org_set_active(config, json, org, user, false, login)
        }
    }
}

fn execute_secret(config: &Config, json: bool, command: SecretCommands) -> Result<(), VaultError> {
    match command {
        SecretCommands::Add {
            org,
            title,
            url,
            username,
            value,
            login,
        } => {
            let secret = NewSecretEntry {
                title,
                url,
                username,
                password: value,
            };
            cmd_secret_add(config, json, org, secret, login)
        }
        SecretCommands::Get { id, login } => cmd_secret_get(config, json, id, login),
        SecretCommands::List { org, login } => cmd_secret_list(config, json, org, login),
        SecretCommands::Audit { id, login } => cmd_secret_audit(config, json, id, login),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), VaultError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Authenticate the acting user or fail the command.
fn sign_in(store: &SqliteAccessStore<'_>, login: &Login) -> Result<User, VaultError> {
    store
        .authenticate(&login.email, &login.password)?
        .ok_or_else(|| VaultError::Other("invalid email or password".to_string()))
}

fn find_user(store: &SqliteAccessStore<'_>, email: &str) -> Result<User, VaultError> {
    store
        .find_user_by_email(email)?
        .ok_or_else(|| VaultError::Other(format!("no user registered with email {}", email)))
}

/// Turn `NotFound`/`Denied` into command failures.
fn require<T>(lookup: Lookup<T>, what: &str) -> Result<T, VaultError> {
    match lookup {
        Lookup::Found(value) => Ok(value),
        Lookup::NotFound => Err(VaultError::Other(format!("{} not found", what))),
        Lookup::Denied => Err(VaultError::Other(format!("access denied: {}", what))),
    }
}

// ─── Init / Users ────────────────────────────────────────────────────────────

fn cmd_init(config: &Config, json: bool) -> Result<(), VaultError> {
    config.init_database()?;
    let encrypted = config.passphrase.is_some();

    if json {
        return print_json(&json!({
            "database": config.db_path.display().to_string(),
            "encrypted": encrypted,
        }));
    }

    println!("✓ orgvault initialized successfully");
    println!("  Database: {}", config.db_path.display());
    if encrypted {
        println!("  Encrypted with a key derived from ORGVAULT_PASSPHRASE");
    } else {
        println!("  Not encrypted (set ORGVAULT_PASSPHRASE to encrypt)");
    }
    println!();
    println!("Next: register a user with `orgvault register --first-name <name> --last-name <name> --email <email>`");

    Ok(())
}

fn cmd_register(
    config: &Config,
    json: bool,
    first_name: String,
    last_name: String,
    login: Login,
) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);

    let user = store.create_user(NewUser {
        first_name,
        last_name,
        email: login.email,
        password: login.password,
    })?;

    if json {
        return print_json(&user);
    }
    println!("✓ Registered {}", user);
    Ok(())
}

fn cmd_login(config: &Config, json: bool, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);

    let user = sign_in(&store, &login)?;

    if json {
        return print_json(&user);
    }
    println!("✓ Signed in as {}", user);
    Ok(())
}

// ─── Organizations ───────────────────────────────────────────────────────────

fn cmd_org_create(config: &Config, json: bool, name: String, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let org = store.create_organization(NewOrganization { name }, &user)?;

    if json {
        return print_json(&org);
    }
    println!("✓ Created organization {}", org);
    println!("  You are its admin.");
    Ok(())
}

fn cmd_org_list(config: &Config, json: bool, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let orgs = store.list_organizations_for_user(user.id)?;

    if json {
        return print_json(&orgs);
    }
    if orgs.is_empty() {
        println!("You are not an active member of any organization.");
        return Ok(());
    }
    for org in orgs {
        println!("{}", org);
    }
    Ok(())
}

fn cmd_org_members(config: &Config, json: bool, org_id: i64, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let members = require(
        store.list_org_members(org_id, user.id)?,
        &format!("organization {}", org_id),
    )?;

    if json {
        return print_json(&members);
    }
    println!("Members of organization {}", org_id);
    println!("{:-<80}", "");
    for member in members {
        println!("{}", member);
    }
    Ok(())
}

fn cmd_org_add_member(
    config: &Config,
    json: bool,
    org_id: i64,
    email: String,
    admin: bool,
    login: Login,
) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let actor = sign_in(&store, &login)?;
    let target = find_user(&store, &email)?;

    let membership = require(
        store.add_member(actor.id, org_id, target.id, admin)?,
        &format!("organization {}", org_id),
    )?;

    if json {
        return print_json(&membership);
    }
    println!(
        "✓ Added {} to organization {}{}",
        email,
        org_id,
        if admin { " as admin" } else { "" }
    );
    Ok(())
}

fn cmd_org_set_active(
    config: &Config,
    json: bool,
    org_id: i64,
    email: String,
    active: bool,
    login: Login,
) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let actor = sign_in(&store, &login)?;
    let target = find_user(&store, &email)?;

    let membership = require(
        store.set_membership_active(actor.id, org_id, target.id, active)?,
        &format!("membership of {} in organization {}", email, org_id),
    )?;

    if json {
        return print_json(&membership);
    }
    let verb = if active { "granted" } else { "revoked" };
    println!("✓ Access {} for {} in organization {}", verb, email, org_id);
    Ok(())
}

// ─── Secrets ─────────────────────────────────────────────────────────────────

fn cmd_secret_add(
    config: &Config,
    json: bool,
    org_id: i64,
    secret: NewSecretEntry,
    login: Login,
) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let stored = require(
        store.add_secret(user.id, org_id, secret)?,
        &format!("organization {}", org_id),
    )?;

    if json {
        return print_json(&stored);
    }
    println!("✓ Secret stored with ID: {}", stored.id);
    Ok(())
}

fn cmd_secret_get(config: &Config, json: bool, id: i64, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let secret = require(
        store.authorize_and_fetch_secret(user.id, id)?,
        &format!("secret {}", id),
    )?;

    if json {
        return print_json(&json!({
            "id": secret.id,
            "org_id": secret.org_id,
            "title": secret.title,
            "url": secret.url,
            "username": secret.username,
            "password": secret.password(),
            "created_at": secret.created_at,
        }));
    }

    println!("ID:        {}", secret.id);
    println!("Org:       {}", secret.org_id);
    println!("Title:     {}", secret.title);
    if let Some(url) = &secret.url {
        println!("URL:       {}", url);
    }
    println!("Username:  {}", secret.username);
    println!("Password:  {}", secret.password());
    println!("Created:   {}", secret.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

fn cmd_secret_list(config: &Config, json: bool, org_id: i64, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let secrets = require(
        store.list_secrets_for_org(org_id, user.id)?,
        &format!("organization {}", org_id),
    )?;

    if json {
        return print_json(&secrets);
    }
    if secrets.is_empty() {
        println!("Organization {} has no secrets.", org_id);
        return Ok(());
    }
    println!("{:<6} {:<30} {:<20} URL", "ID", "TITLE", "USERNAME");
    println!("{:-<80}", "");
    for secret in secrets {
        println!(
            "{:<6} {:<30} {:<20} {}",
            secret.id,
            secret.title,
            secret.username,
            secret.url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_secret_audit(config: &Config, json: bool, id: i64, login: Login) -> Result<(), VaultError> {
    let db = config.open_database()?;
    let store = SqliteAccessStore::new(&db);
    let user = sign_in(&store, &login)?;

    let logs = require(store.audit_logs(user.id, id)?, &format!("secret {}", id))?;

    if json {
        return print_json(&logs);
    }
    if logs.is_empty() {
        println!("No audit logs found for secret: {}", id);
        return Ok(());
    }
    println!("Audit Log for Secret: {}", id);
    println!("{:-<80}", "");
    for log in logs {
        println!("{}", log);
    }
    println!("{:-<80}", "");
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    fn run(db: &Path, args: &[&str]) -> Result<(), VaultError> {
        let mut argv = vec!["orgvault", "--db", db.to_str().unwrap()];
        argv.extend_from_slice(args);
        execute(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_commands_require_init() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("vault.db");

        let result = run(&db, &["login", "--email", "a@b.test", "--password", "pw"]);
        assert!(matches!(
            result,
            Err(VaultError::Store(crate::store::StoreError::NotInitialized))
        ));
    }

    #[test]
    fn test_end_to_end_flow() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("vault.db");
        let ada: &[&str] = &["--email", "ada@example.com", "--password", "pw"];

        run(&db, &["init"]).unwrap();
        run(&db, &[&["register", "--first-name", "Ada", "--last-name", "L"][..], ada].concat())
            .unwrap();
        run(&db, &[&["org", "create", "--name", "Acme"][..], ada].concat()).unwrap();
        run(
            &db,
            &[
                &["secret", "add", "--org", "1", "--title", "vpn", "--username", "svc", "--value", "s3"][..],
                ada,
            ]
            .concat(),
        )
        .unwrap();
        run(&db, &[&["secret", "get", "1"][..], ada].concat()).unwrap();

        let wrong = run(
            &db,
            &["secret", "get", "1", "--email", "ada@example.com", "--password", "nope"],
        );
        assert!(matches!(wrong, Err(VaultError::Other(ref m)) if m.contains("invalid email")));

        let missing = run(&db, &[&["secret", "get", "99"][..], ada].concat());
        assert!(matches!(missing, Err(VaultError::Other(ref m)) if m.contains("not found")));

        let bob: &[&str] = &["--email", "bob@example.com", "--password", "pw"];
        run(&db, &[&["register", "--first-name", "Bob", "--last-name", "B"][..], bob].concat())
            .unwrap();
        run(&db, &[&["org", "members", "--org", "1"][..], ada].concat()).unwrap();
        let outsider = run(&db, &[&["org", "members", "--org", "1"][..], bob].concat());
        assert!(matches!(outsider, Err(VaultError::Other(ref m)) if m.contains("access denied")));
    }
}
