// orgvault — Access-Scoped Store Repository
//
// Every read of organization data re-derives the authorization predicate
// (`membership.user_id = requester AND membership.is_active = 1`) inside the
// same query or transaction as the fetch. Callers are never trusted to have
// checked membership beforehand.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::db::Database;
use super::models::{
    Lookup, MemberProfile, Membership, NewOrganization, NewSecretEntry, NewUser, Organization,
    SecretEntry, User,
};
use super::password::{hash_password, verify_password, HASH_COST, MAX_PASSWORD_BYTES};
use super::StoreError;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password";

const SECRET_COLUMNS: &str =
    "pwd.id, pwd.org_id, pwd.title, pwd.url, pwd.username, pwd.password, pwd.created_at";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the access-scoped vault operations.
pub trait AccessStore {
    /// Verify an email/password pair. Unknown emails and wrong passwords both
    /// yield `Ok(None)`.
    fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, StoreError>;

    fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Register a user. The password is bcrypt-hashed before it reaches the
    /// database; a duplicate email is a `Conflict`, and a password longer
    /// than bcrypt's 72-byte input is `PasswordTooLong`.
    fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Organizations in which the user holds an active membership, by id.
    fn list_organizations_for_user(&self, user_id: i64) -> Result<Vec<Organization>, StoreError>;

    /// Public profiles of the organization's active members.
    fn list_users_for_organization(&self, org_id: i64) -> Result<Vec<MemberProfile>, StoreError>;

    /// Create an organization and make `creator` its active admin, atomically.
    fn create_organization(
        &self,
        org: NewOrganization,
        creator: &User,
    ) -> Result<Organization, StoreError>;

    /// Fetch a secret only if the user is an active member of its organization.
    /// Every outcome for an existing secret is audit-logged.
    fn authorize_and_fetch_secret(
        &self,
        user_id: i64,
        secret_id: i64,
    ) -> Result<Lookup<SecretEntry>, StoreError>;

    /// All secrets of an organization, for an active member. An empty
    /// `Found` means the organization simply has no secrets.
    fn list_secrets_for_org(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Lookup<Vec<SecretEntry>>, StoreError>;

    /// Active members' profiles, for a user who is an active member of the
    /// organization. The check and the read share one transaction.
    fn list_org_members(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Lookup<Vec<MemberProfile>>, StoreError>;

    fn find_membership(&self, org_id: i64, user_id: i64) -> Result<Option<Membership>, StoreError>;

    /// Add an existing user to an organization. `actor_id` must be an active admin.
    fn add_member(
        &self,
        actor_id: i64,
        org_id: i64,
        user_id: i64,
        is_admin: bool,
    ) -> Result<Lookup<Membership>, StoreError>;

    /// Grant (`active = true`) or revoke access. `actor_id` must be an active admin.
    ///
    /// Admins may revoke themselves. Revoking the last active admin is allowed
    /// but leaves the organization with nobody able to grant access again;
    /// it is logged at `warn`.
    fn set_membership_active(
        &self,
        actor_id: i64,
        org_id: i64,
        user_id: i64,
        active: bool,
    ) -> Result<Lookup<Membership>, StoreError>;

    /// Store a new secret under an organization the user is an active member of.
    fn add_secret(
        &self,
        user_id: i64,
        org_id: i64,
        secret: NewSecretEntry,
    ) -> Result<Lookup<SecretEntry>, StoreError>;

    /// Formatted access history of a secret, oldest first. Admins only.
    fn audit_logs(&self, user_id: i64, secret_id: i64) -> Result<Lookup<Vec<String>>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteAccessStore<'a> {
    db: &'a Database,
    hash_cost: u32,
}

impl<'a> SqliteAccessStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            hash_cost: HASH_COST,
        }
    }

    /// Cheap bcrypt cost so unit tests stay fast.
    #[cfg(test)]
    pub(crate) fn with_hash_cost(db: &'a Database, hash_cost: u32) -> Self {
        Self { db, hash_cost }
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User::new(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn row_to_org(row: &rusqlite::Row<'_>) -> rusqlite::Result<Organization> {
        Ok(Organization {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
        Ok(Membership {
            user_id: row.get(0)?,
            org_id: row.get(1)?,
            is_admin: row.get(2)?,
            is_active: row.get(3)?,
        })
    }

    /// Parse a secret row laid out as `SECRET_COLUMNS`.
    fn row_to_secret(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretEntry> {
        let created_at_str: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(SecretEntry::new(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            created_at,
        ))
    }

    /// `None` if the org does not exist, otherwise whether `user_id` holds an
    /// active membership (and, with `admin_only`, an admin one).
    fn org_access(
        conn: &Connection,
        org_id: i64,
        user_id: i64,
        admin_only: bool,
    ) -> Result<Option<bool>, StoreError> {
        let access = conn
            .query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM membership
                     WHERE membership.org_id = org.id
                       AND membership.user_id = ?2
                       AND membership.is_active = 1
                       AND (?3 = 0 OR membership.is_admin = 1)
                 )
                 FROM org WHERE org.id = ?1",
                params![org_id, user_id, admin_only],
                |row| row.get(0),
            )
            .optional()?;
        Ok(access)
    }

    fn read_membership(
        conn: &Connection,
        org_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, StoreError> {
        let membership = conn
            .query_row(
                "SELECT user_id, org_id, is_admin, is_active FROM membership
                 WHERE org_id = ?1 AND user_id = ?2",
                params![org_id, user_id],
                Self::row_to_membership,
            )
            .optional()?;
        Ok(membership)
    }

    /// Write an entry to the secret access log.
    fn log_access(
        conn: &Connection,
        secret_id: i64,
        action: &str,
        user_id: i64,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO audit_log (pwd_id, action, user_id, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![secret_id, action, user_id, Utc::now().to_rfc3339()],
        )?;

        tracing::debug!(
            secret_id = %secret_id,
            action = %action,
            user_id = %user_id,
            "Audit log entry recorded"
        );

        Ok(())
    }
}

impl<'a> AccessStore for SqliteAccessStore<'a> {
    fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let user = match self.find_user_by_email(email)? {
            Some(user) => user,
            None => {
                tracing::warn!("Login rejected: unknown email");
                return Ok(None);
            }
        };

        if verify_password(password, user.password_hash())? {
            tracing::debug!(user_id = %user.id, "User authenticated");
            Ok(Some(user))
        } else {
            tracing::warn!(user_id = %user.id, "Login rejected: wrong password");
            Ok(None)
        }
    }

    fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;

        let mut rows = stmt.query_map(params![id], Self::row_to_user)?;

        match rows.next() {
            Some(Ok(user)) => Ok(Some(user)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = self
            .db
            .conn()
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        if user.password.len() > MAX_PASSWORD_BYTES {
            return Err(StoreError::PasswordTooLong(user.password.len()));
        }
        let password_hash = hash_password(&user.password, self.hash_cost)?;

        self.db
            .conn()
            .execute(
                "INSERT INTO users (first_name, last_name, email, password)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.first_name, user.last_name, user.email, password_hash],
            )
            .map_err(|e| {
                StoreError::from_insert(e, &format!("email already registered: {}", user.email))
            })?;

        let id = self.db.conn().last_insert_rowid();

        tracing::info!(user_id = %id, "User registered");

        Ok(User::new(
            id,
            user.first_name,
            user.last_name,
            user.email,
            password_hash,
        ))
    }

    fn list_organizations_for_user(&self, user_id: i64) -> Result<Vec<Organization>, StoreError> {
        if user_id <= 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.db.conn().prepare(
            "SELECT org.id, org.name FROM org
             JOIN membership ON membership.org_id = org.id
             WHERE membership.user_id = ?1 AND membership.is_active = 1
             ORDER BY org.id",
        )?;

        let rows = stmt.query_map(params![user_id], Self::row_to_org)?;

        let mut orgs = Vec::new();
        for row in rows {
            orgs.push(row?);
        }

        Ok(orgs)
    }

    fn list_users_for_organization(&self, org_id: i64) -> Result<Vec<MemberProfile>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT users.first_name, users.last_name, users.email FROM users
             JOIN membership ON membership.user_id = users.id
             WHERE membership.org_id = ?1 AND membership.is_active = 1
             ORDER BY users.id",
        )?;

        let rows = stmt.query_map(params![org_id], |row| {
            Ok(MemberProfile {
                first_name: row.get(0)?,
                last_name: row.get(1)?,
                email: row.get(2)?,
            })
        })?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }

        Ok(members)
    }

    fn create_organization(
        &self,
        org: NewOrganization,
        creator: &User,
    ) -> Result<Organization, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        tx.execute("INSERT INTO org (name) VALUES (?1)", params![org.name])?;
        let org_id = tx.last_insert_rowid();

        // Dropping `tx` on error rolls back the org row as well.
        tx.execute(
            "INSERT INTO membership (user_id, org_id, is_admin, is_active)
             VALUES (?1, ?2, 1, 1)",
            params![creator.id, org_id],
        )
        .map_err(|e| {
            tracing::error!(
                user_id = %creator.id,
                error = %e,
                "Creator membership insert failed, rolling back organization"
            );
            StoreError::from_insert(e, "creator is already a member")
        })?;

        tx.commit()?;

        tracing::info!(org_id = %org_id, user_id = %creator.id, "Organization created");

        Ok(Organization {
            id: org_id,
            name: org.name,
        })
    }

    fn authorize_and_fetch_secret(
        &self,
        user_id: i64,
        secret_id: i64,
    ) -> Result<Lookup<SecretEntry>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        // The password column is only selected when the membership join matched.
        let row = tx
            .query_row(
                "SELECT pwd.id, pwd.org_id, pwd.title, pwd.url, pwd.username,
                        CASE WHEN membership.user_id IS NULL THEN NULL ELSE pwd.password END,
                        pwd.created_at,
                        membership.user_id IS NOT NULL
                 FROM pwd
                 LEFT JOIN membership
                        ON membership.org_id = pwd.org_id
                       AND membership.user_id = ?1
                       AND membership.is_active = 1
                 WHERE pwd.id = ?2",
                params![user_id, secret_id],
                |row| {
                    let authorized: bool = row.get(7)?;
                    if authorized {
                        Ok(Some(Self::row_to_secret(row)?))
                    } else {
                        Ok(None)
                    }
                },
            )
            .optional()?;

        let outcome = match row {
            None => Lookup::NotFound,
            Some(None) => {
                Self::log_access(&tx, secret_id, "access_denied", user_id)?;
                tracing::warn!(
                    user_id = %user_id,
                    secret_id = %secret_id,
                    "Secret access denied: no active membership"
                );
                Lookup::Denied
            }
            Some(Some(secret)) => {
                Self::log_access(&tx, secret_id, "secret_accessed", user_id)?;
                Lookup::Found(secret)
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn list_secrets_for_org(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Lookup<Vec<SecretEntry>>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        match Self::org_access(&tx, org_id, user_id, false)? {
            None => return Ok(Lookup::NotFound),
            Some(false) => {
                tracing::warn!(org_id = %org_id, user_id = %user_id, "Secret listing denied");
                return Ok(Lookup::Denied);
            }
            Some(true) => {}
        }

        let secrets = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM pwd
                 JOIN membership ON membership.org_id = pwd.org_id
                 WHERE pwd.org_id = ?1
                   AND membership.user_id = ?2
                   AND membership.is_active = 1
                 ORDER BY pwd.id",
                SECRET_COLUMNS
            ))?;

            let rows = stmt.query_map(params![org_id, user_id], Self::row_to_secret)?;

            let mut secrets = Vec::new();
            for row in rows {
                secrets.push(row?);
            }
            secrets
        };

        tx.commit()?;
        Ok(Lookup::Found(secrets))
    }

    fn list_org_members(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Lookup<Vec<MemberProfile>>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        match Self::org_access(&tx, org_id, user_id, false)? {
            None => return Ok(Lookup::NotFound),
            Some(false) => {
                tracing::warn!(org_id = %org_id, user_id = %user_id, "Member listing denied");
                return Ok(Lookup::Denied);
            }
            Some(true) => {}
        }

        let members = {
            let mut stmt = tx.prepare(
                "SELECT users.first_name, users.last_name, users.email FROM users
                 JOIN membership ON membership.user_id = users.id
                 WHERE membership.org_id = ?1
                   AND membership.is_active = 1
                   AND EXISTS (
                       SELECT 1 FROM membership AS requester
                       WHERE requester.org_id = ?1
                         AND requester.user_id = ?2
                         AND requester.is_active = 1
                   )
                 ORDER BY users.id",
            )?;

            let rows = stmt.query_map(params![org_id, user_id], |row| {
                Ok(MemberProfile {
                    first_name: row.get(0)?,
                    last_name: row.get(1)?,
                    email: row.get(2)?,
                })
            })?;

            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            members
        };

        tx.commit()?;
        Ok(Lookup::Found(members))
    }

    fn find_membership(&self, org_id: i64, user_id: i64) -> Result<Option<Membership>, StoreError> {
        Self::read_membership(self.db.conn(), org_id, user_id)
    }

    fn add_member(
        &self,
        actor_id: i64,
        org_id: i64,
        user_id: i64,
        is_admin: bool,
    ) -> Result<Lookup<Membership>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        match Self::org_access(&tx, org_id, actor_id, true)? {
            None => return Ok(Lookup::NotFound),
            Some(false) => {
                tracing::warn!(org_id = %org_id, actor_id = %actor_id, "Add member denied");
                return Ok(Lookup::Denied);
            }
            Some(true) => {}
        }

        let user_exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Ok(Lookup::NotFound);
        }

        tx.execute(
            "INSERT INTO membership (user_id, org_id, is_admin, is_active)
             VALUES (?1, ?2, ?3, 1)",
            params![user_id, org_id, is_admin],
        )
        .map_err(|e| StoreError::from_insert(e, "user is already a member"))?;

        tx.commit()?;

        tracing::info!(
            org_id = %org_id,
            user_id = %user_id,
            actor_id = %actor_id,
            is_admin,
            "Member added"
        );

        Ok(Lookup::Found(Membership {
            user_id,
            org_id,
            is_admin,
            is_active: true,
        }))
    }

    fn set_membership_active(
        &self,
        actor_id: i64,
        org_id: i64,
        user_id: i64,
        active: bool,
    ) -> Result<Lookup<Membership>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        match Self::org_access(&tx, org_id, actor_id, true)? {
            None => return Ok(Lookup::NotFound),
            Some(false) => {
                tracing::warn!(org_id = %org_id, actor_id = %actor_id, "Membership change denied");
                return Ok(Lookup::Denied);
            }
            Some(true) => {}
        }

        let affected = tx.execute(
            "UPDATE membership SET is_active = ?3 WHERE org_id = ?1 AND user_id = ?2",
            params![org_id, user_id, active],
        )?;
        if affected == 0 {
            return Ok(Lookup::NotFound);
        }

        let membership = Self::read_membership(&tx, org_id, user_id)?;
        let admins_left: i64 = tx.query_row(
            "SELECT count(*) FROM membership
             WHERE org_id = ?1 AND is_admin = 1 AND is_active = 1",
            params![org_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        tracing::info!(
            org_id = %org_id,
            user_id = %user_id,
            actor_id = %actor_id,
            active,
            "Membership status changed"
        );
        if admins_left == 0 {
            tracing::warn!(
                org_id = %org_id,
                "No active admin left; membership can no longer be changed"
            );
        }

        Ok(match membership {
            Some(m) => Lookup::Found(m),
            None => Lookup::NotFound,
        })
    }

    fn add_secret(
        &self,
        user_id: i64,
        org_id: i64,
        secret: NewSecretEntry,
    ) -> Result<Lookup<SecretEntry>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        if Self::org_access(&tx, org_id, user_id, false)?.is_none() {
            return Ok(Lookup::NotFound);
        }

        let created_at = Utc::now();

        // The insert selects from membership, so it writes nothing unless the
        // requester is an active member.
        let affected = tx.execute(
            "INSERT INTO pwd (org_id, title, url, username, password, created_at)
             SELECT ?1, ?3, ?4, ?5, ?6, ?7 FROM membership
             WHERE membership.org_id = ?1
               AND membership.user_id = ?2
               AND membership.is_active = 1",
            params![
                org_id,
                user_id,
                secret.title,
                secret.url,
                secret.username,
                secret.password.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            tracing::warn!(org_id = %org_id, user_id = %user_id, "Secret creation denied");
            return Ok(Lookup::Denied);
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(secret_id = %id, org_id = %org_id, user_id = %user_id, "Secret stored");

        Ok(Lookup::Found(SecretEntry::new(
            id,
            org_id,
            secret.title,
            secret.url,
            secret.username,
            secret.password.to_string(),
            created_at,
        )))
    }

    fn audit_logs(&self, user_id: i64, secret_id: i64) -> Result<Lookup<Vec<String>>, StoreError> {
        let conn = self.db.conn();

        let is_admin: Option<bool> = conn
            .query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM membership
                     WHERE membership.org_id = pwd.org_id
                       AND membership.user_id = ?2
                       AND membership.is_admin = 1
                       AND membership.is_active = 1
                 )
                 FROM pwd WHERE pwd.id = ?1",
                params![secret_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        match is_admin {
            None => return Ok(Lookup::NotFound),
            Some(false) => return Ok(Lookup::Denied),
            Some(true) => {}
        }

        let mut stmt = conn.prepare(
            "SELECT audit_log.action, audit_log.timestamp, users.email
             FROM audit_log
             LEFT JOIN users ON users.id = audit_log.user_id
             WHERE audit_log.pwd_id = ?1
             ORDER BY audit_log.id ASC",
        )?;

        let rows = stmt.query_map(params![secret_id], |row| {
            let action: String = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let email: Option<String> = row.get(2)?;

            let stamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or(timestamp_str);

            Ok(format!(
                "[{}] {} by '{}'",
                stamp,
                action,
                email.as_deref().unwrap_or("<deleted user>")
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }

        Ok(Lookup::Found(logs))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
