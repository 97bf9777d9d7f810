// orgvault — Store data models
//
// SECURITY: password hashes and secret passwords are private fields. They are
// never included in Debug output, log messages, or serialized responses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A registered user. The bcrypt hash is private — compare only via
/// `AccessStore::authenticate()`.
#[derive(Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    password_hash: String,
}

impl User {
    pub fn new(
        id: i64,
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            email,
            password_hash,
        }
    }

    /// The stored bcrypt hash (never the plaintext).
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} <{}>",
            self.id, self.first_name, self.last_name, self.email
        )
    }
}

/// Registration input. `password` is the plaintext and is zeroized on drop.
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Zeroizing<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
}

/// A (user, organization) pairing. `is_active` is the only access gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: i64,
    pub org_id: i64,
    pub is_admin: bool,
    pub is_active: bool,
}

/// Public profile fields of an active member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl fmt::Display for MemberProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <{}>", self.first_name, self.last_name, self.email)
    }
}

/// A stored credential ("pwd") owned by exactly one organization.
/// The password is private — access only via `password()`.
#[derive(Clone, PartialEq, Serialize)]
pub struct SecretEntry {
    pub id: i64,
    pub org_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub username: String,
    #[serde(skip)]
    password: Zeroizing<String>,
    pub created_at: DateTime<Utc>,
}

impl SecretEntry {
    pub fn new(
        id: i64,
        org_id: i64,
        title: String,
        url: Option<String>,
        username: String,
        password: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            title,
            url,
            username,
            password: Zeroizing::new(password),
            created_at,
        }
    }

    /// Access the stored password. Only reachable through an
    /// authorization-scoped store call.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEntry")
            .field("id", &self.id)
            .field("org_id", &self.org_id)
            .field("title", &self.title)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl fmt::Display for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.id, self.title, self.username)?;
        if let Some(url) = &self.url {
            write!(f, " — {}", url)?;
        }
        Ok(())
    }
}

/// Input for a new secret entry.
pub struct NewSecretEntry {
    pub title: String,
    pub url: Option<String>,
    pub username: String,
    pub password: Zeroizing<String>,
}

/// Outcome of an authorization-scoped operation.
///
/// `NotFound` and `Denied` are distinct so callers can branch on them; store
/// failures travel separately as `Err(StoreError)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Denied,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Lookup::Denied)
    }

    /// Discard the denied/not-found distinction.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound | Lookup::Denied => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Denied => Lookup::Denied,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_secret() -> SecretEntry {
        SecretEntry::new(
            7,
            1,
            "Production DB".to_string(),
            Some("https://db.acme.test".to_string()),
            "admin".to_string(),
            "hunter2-super-secret".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_user_debug_redacts_hash() {
        let user = User::new(
            1,
            "Ada".to_string(),
            "Lovelace".to_string(),
            "ada@example.com".to_string(),
            "$2b$12$abcdefghijklmnopqrstuv".to_string(),
        );

        let debug_output = format!("{:?}", user);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("$2b$12$"));
    }

    #[test]
    fn test_user_json_omits_hash() {
        let user = User::new(
            1,
            "Ada".to_string(),
            "Lovelace".to_string(),
            "ada@example.com".to_string(),
            "$2b$12$abcdefghijklmnopqrstuv".to_string(),
        );

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"), "User JSON must not contain the hash");
        assert!(json.contains("ada@example.com"));
    }

    #[test]
    fn test_secret_debug_and_display_redact_password() {
        let secret = sample_secret();

        let debug_output = format!("{:?}", secret);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-super-secret"));

        let display_output = format!("{}", secret);
        assert!(!display_output.contains("hunter2-super-secret"));
        assert!(display_output.contains("Production DB"));
    }

    #[test]
    fn test_secret_json_omits_password() {
        let json = serde_json::to_string(&sample_secret()).unwrap();
        assert!(!json.contains("hunter2-super-secret"));
        assert!(json.contains("\"username\":\"admin\""));
    }

    #[test]
    fn test_secret_password_accessor() {
        assert_eq!(sample_secret().password(), "hunter2-super-secret");
    }

    #[test]
    fn test_lookup_helpers() {
        let found: Lookup<i32> = Lookup::Found(3);
        assert!(found.is_found());
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(6));
        assert_eq!(found.found(), Some(3));

        let denied: Lookup<i32> = Lookup::Denied;
        assert!(denied.is_denied());
        assert_eq!(denied.map(|v| v * 2), Lookup::Denied);
        assert_eq!(Lookup::<i32>::NotFound.found(), None);
    }
}
