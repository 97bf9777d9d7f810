// orgvault — Database Management
//
// Opens and initializes the vault database. When a key is supplied it is set
// via PRAGMA before any tables are accessed, so the file is SQLCipher-encrypted.
// Foreign keys are switched on for every connection; the membership and pwd
// tables depend on them.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around a (optionally SQLCipher-encrypted) SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path.
    /// `hex_key`, when present, is the hex-encoded 32-byte key derived with Argon2id.
    pub fn open(path: &Path, hex_key: Option<&str>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        if let Some(key) = hex_key {
            conn.pragma_update(None, "key", format!("x'{}'", key))?;
        }

        // A wrong key (or a missing key on an encrypted file) surfaces here
        // as "file is not a database".
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidKey)?;

        let db = Self { conn };
        db.configure()?;
        db.run_migrations()?;

        Ok(db)
    }

    /// Open a database that `orgvault init` has already created.
    pub fn open_existing(path: &Path, hex_key: Option<&str>) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotInitialized);
        }
        Self::open(path, hex_key)
    }

    /// Open an in-memory database (unencrypted, for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.configure()?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn configure(&self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run schema migrations to create or update tables.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS org (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS membership (
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                org_id      INTEGER NOT NULL REFERENCES org(id) ON DELETE CASCADE,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                is_active   INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, org_id)
            );

            CREATE TABLE IF NOT EXISTS pwd (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id      INTEGER NOT NULL REFERENCES org(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                url         TEXT,
                username    TEXT NOT NULL,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                pwd_id      INTEGER NOT NULL,
                action      TEXT NOT NULL,
                user_id     INTEGER NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_membership_org
                ON membership(org_id);

            CREATE INDEX IF NOT EXISTS idx_pwd_org
                ON pwd(org_id);

            CREATE INDEX IF NOT EXISTS idx_audit_pwd
                ON audit_log(pwd_id);
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn table_exists(db: &Database, name: &str) -> bool {
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_open_in_memory_succeeds() {
        assert!(Database::open_in_memory().is_ok());
    }

    #[test]
    fn test_schema_migration_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        for table in ["users", "org", "membership", "pwd", "audit_log"] {
            assert!(table_exists(&db, table), "{} table should exist", table);
        }
    }

    #[test]
    fn test_schema_migration_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.run_migrations().is_ok(), "Migrations should be idempotent");
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn().execute(
            "INSERT INTO membership (user_id, org_id, is_admin) VALUES (?1, ?2, 1)",
            rusqlite::params![42, 42],
        );
        assert!(result.is_err(), "Membership must reference existing rows");
    }

    #[test]
    fn test_membership_pair_is_unique() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "INSERT INTO users (first_name, last_name, email, password)
                     VALUES ('A', 'B', 'a@b.test', 'x');
                 INSERT INTO org (name) VALUES ('Acme');
                 INSERT INTO membership (user_id, org_id) VALUES (1, 1);",
            )
            .unwrap();

        let dup = db.conn().execute(
            "INSERT INTO membership (user_id, org_id) VALUES (1, 1)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_encrypted_db_with_correct_key() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("vault.db");

        Database::open(&db_path, Some(KEY)).unwrap();
        assert!(Database::open(&db_path, Some(KEY)).is_ok());
    }

    #[test]
    fn test_encrypted_db_wrong_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("vault_wrong_key.db");
        let wrong_key = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

        {
            let _db = Database::open(&db_path, Some(KEY)).unwrap();
        }

        let result = Database::open(&db_path, Some(wrong_key));
        assert!(matches!(result, Err(StoreError::InvalidKey)));
    }

    #[test]
    fn test_open_existing_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing.db");

        let result = Database::open_existing(&db_path, None);
        assert!(matches!(result, Err(StoreError::NotInitialized)));
        assert!(!db_path.exists(), "open_existing must not create the file");
    }
}
