//! Database schema migrations for SQLite.
//!
//! Each migration transforms the schema from version N to N+1. Applied
//! versions are recorded in `schema_migrations`.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: calling it on an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT MAX(version) FROM schema_migrations",
            [],
            |row| row.get::<_, Option<u32>>(0),
        )
        .optional()?
        .flatten()
        .unwrap_or(0);

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, Utc::now().timestamp_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: initial schema.
///
/// Ids are 12-byte blobs, timestamps are Unix milliseconds, and nested
/// structured values (key material, tags) are CBOR blobs.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id BLOB PRIMARY KEY,                    -- 12-byte object id
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,             -- normalized (trimmed, lowercase)
            password_hash BLOB NOT NULL,            -- CBOR PasswordHash
            symmetric_key BLOB NOT NULL,            -- CBOR WrappedKey
            asymmetric_key BLOB NOT NULL,           -- CBOR AsymmetricKey
            is_blacklisted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Embedded membership list; rowid preserves append order
        CREATE TABLE memberships (
            user_id BLOB NOT NULL REFERENCES users(id),
            organization_id BLOB NOT NULL,
            is_admin INTEGER NOT NULL,
            wrapped_key BLOB NOT NULL,              -- CBOR WrappedKey
            UNIQUE(user_id, organization_id)
        );

        CREATE TABLE organizations (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            billing_email TEXT,
            admin_email TEXT NOT NULL,
            key_material BLOB NOT NULL,             -- CBOR KeyMaterial
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE invites (
            id BLOB PRIMARY KEY,
            from_email TEXT NOT NULL,
            to_email TEXT NOT NULL,
            organization_id BLOB NOT NULL,
            expires_at INTEGER NOT NULL,
            wrapped_key BLOB NOT NULL,              -- CBOR WrappedKey
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE secrets (
            id BLOB PRIMARY KEY,
            encrypted_data TEXT NOT NULL,
            user_id BLOB NOT NULL,
            user_role TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            tags BLOB NOT NULL,                     -- CBOR array of strings
            creator_email TEXT NOT NULL,
            kind TEXT NOT NULL,
            organization_id BLOB NOT NULL,
            expires_at INTEGER,
            reference_key BLOB,                     -- original secret id, NULL for originals
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX idx_memberships_org ON memberships(organization_id);
        CREATE INDEX idx_invites_org ON invites(organization_id, created_at);
        CREATE INDEX idx_invites_to ON invites(to_email, created_at);
        CREATE INDEX idx_secrets_owner ON secrets(user_id, created_at);
        CREATE INDEX idx_secrets_org_ref ON secrets(organization_id, reference_key);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "memberships",
            "organizations",
            "invites",
            "secrets",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }
}
