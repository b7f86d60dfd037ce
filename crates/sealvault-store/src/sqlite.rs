//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use sealvault_core::{
    Email, Invite, ObjectId, Organization, OrganizationMembership, Secret, SecretUser, User,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    Cursor, FindOptions, InviteFilter, InviteScope, SecretFilter, Store, UpdateResult,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, symmetric_key, asymmetric_key, \
                            is_blacklisted, created_at, updated_at";

const ORGANIZATION_COLUMNS: &str =
    "id, name, billing_email, admin_email, key_material, created_at, updated_at";

const INVITE_COLUMNS: &str = "id, from_email, to_email, organization_id, expires_at, \
                              wrapped_key, created_at, updated_at";

const SECRET_COLUMNS: &str = "id, encrypted_data, user_id, user_role, name, description, tags, \
                              creator_email, kind, organization_id, expires_at, reference_key, \
                              created_at, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding helpers
// ─────────────────────────────────────────────────────────────────────────────

fn id_blob(id: &ObjectId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Encode(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8], column: &str) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Decode(format!("{}: {}", column, e)))
}

fn millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Map a unique-constraint failure to `Duplicate`, anything else as-is.
fn on_conflict(err: rusqlite::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Duplicate(what())
        }
        _ => StoreError::Database(err),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn get_id(row: &Row<'_>, column: &str) -> Result<ObjectId> {
    let bytes: Vec<u8> = row.get(column)?;
    ObjectId::try_from(bytes.as_slice())
        .map_err(|_| StoreError::Decode(format!("{}: expected 12 bytes, got {}", column, bytes.len())))
}

fn get_opt_id(row: &Row<'_>, column: &str) -> Result<Option<ObjectId>> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| {
            ObjectId::try_from(b.as_slice())
                .map_err(|_| StoreError::Decode(format!("{}: expected 12 bytes", column)))
        })
        .transpose()
}

fn get_email(row: &Row<'_>, column: &str) -> Result<Email> {
    let raw: String = row.get(column)?;
    Email::parse(&raw).map_err(|e| StoreError::Decode(format!("{}: {}", column, e)))
}

fn get_time(row: &Row<'_>, column: &str) -> Result<DateTime<Utc>> {
    let ms: i64 = row.get(column)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Decode(format!("{}: timestamp out of range", column)))
}

fn get_opt_time(row: &Row<'_>, column: &str) -> Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(column)?;
    ms.map(|ms| {
        DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| StoreError::Decode(format!("{}: timestamp out of range", column)))
    })
    .transpose()
}

fn get_cbor<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> Result<T> {
    let bytes: Vec<u8> = row.get(column)?;
    from_cbor(&bytes, column)
}

fn load_memberships(conn: &Connection, user_id: &ObjectId) -> Result<Vec<OrganizationMembership>> {
    let mut stmt = conn.prepare_cached(
        "SELECT organization_id, is_admin, wrapped_key FROM memberships
         WHERE user_id = ?1 ORDER BY rowid",
    )?;
    let mut rows = stmt.query(params![id_blob(user_id)])?;

    let mut memberships = Vec::new();
    while let Some(row) = rows.next()? {
        memberships.push(OrganizationMembership {
            organization_id: get_id(row, "organization_id")?,
            is_admin: row.get("is_admin")?,
            wrapped_org_key: get_cbor(row, "wrapped_key")?,
        });
    }
    Ok(memberships)
}

fn read_user(conn: &Connection, row: &Row<'_>) -> Result<User> {
    let id = get_id(row, "id")?;
    Ok(User {
        id,
        name: row.get("name")?,
        email: get_email(row, "email")?,
        password_hash: get_cbor(row, "password_hash")?,
        symmetric_key: get_cbor(row, "symmetric_key")?,
        asymmetric_key: get_cbor(row, "asymmetric_key")?,
        is_blacklisted: row.get("is_blacklisted")?,
        memberships: load_memberships(conn, &id)?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn read_organization(row: &Row<'_>) -> Result<Organization> {
    let billing_email: Option<String> = row.get("billing_email")?;
    Ok(Organization {
        id: get_id(row, "id")?,
        name: row.get("name")?,
        billing_email: billing_email
            .map(|raw| {
                Email::parse(&raw).map_err(|e| StoreError::Decode(format!("billing_email: {}", e)))
            })
            .transpose()?,
        admin_email: get_email(row, "admin_email")?,
        key_material: get_cbor(row, "key_material")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn read_invite(row: &Row<'_>) -> Result<Invite> {
    Ok(Invite {
        id: get_id(row, "id")?,
        from_email: get_email(row, "from_email")?,
        to_email: get_email(row, "to_email")?,
        organization_id: get_id(row, "organization_id")?,
        expires_at: get_time(row, "expires_at")?,
        wrapped_key: get_cbor(row, "wrapped_key")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn read_secret(row: &Row<'_>) -> Result<Secret> {
    Ok(Secret {
        id: get_id(row, "id")?,
        encrypted_data: row.get("encrypted_data")?,
        user: SecretUser {
            id: get_id(row, "user_id")?,
            role: row.get("user_role")?,
        },
        name: row.get("name")?,
        description: row.get("description")?,
        tags: get_cbor(row, "tags")?,
        creator_email: get_email(row, "creator_email")?,
        kind: row.get("kind")?,
        organization_id: get_id(row, "organization_id")?,
        expires_at: get_opt_time(row, "expires_at")?,
        reference_key: get_opt_id(row, "reference_key")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

/// Run a listing query, decoding each row independently.
/// Pass a decoded row through, logging it when it failed to decode.
fn logged<T>(table: &'static str, item: Result<T>) -> Result<T> {
    if let Err(err) = &item {
        tracing::warn!(table, error = %err, "row failed to decode");
    }
    item
}

fn collect_rows<T>(
    conn: &Connection,
    table: &'static str,
    sql: &str,
    values: Vec<Value>,
    read: impl Fn(&Row<'_>) -> Result<T>,
) -> Result<Cursor<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(logged(table, read(row)));
    }
    Ok(out)
}

fn page_clause(options: &FindOptions, values: &mut Vec<Value>) -> String {
    let dir = options.sql_direction();
    values.push(Value::Integer(options.limit as i64));
    values.push(Value::Integer(options.skip.min(i64::MAX as u64) as i64));
    format!(
        " ORDER BY created_at {dir}, id {dir} LIMIT ?{} OFFSET ?{}",
        values.len() - 1,
        values.len()
    )
}

fn insert_secret_row(conn: &Connection, secret: &Secret) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO secrets ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            SECRET_COLUMNS
        ),
        params![
            id_blob(&secret.id),
            secret.encrypted_data,
            id_blob(&secret.user.id),
            secret.user.role,
            secret.name,
            secret.description,
            to_cbor(&secret.tags)?,
            secret.creator_email.as_str(),
            secret.kind,
            id_blob(&secret.organization_id),
            secret.expires_at.as_ref().map(millis),
            secret.reference_key.as_ref().map(id_blob),
            millis(&secret.created_at),
            millis(&secret.updated_at),
        ],
    )
    .map_err(|e| on_conflict(e, || format!("secret {}", secret.id)))?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    USER_COLUMNS
                ),
                params![
                    id_blob(&user.id),
                    user.name,
                    user.email.as_str(),
                    to_cbor(&user.password_hash)?,
                    to_cbor(&user.symmetric_key)?,
                    to_cbor(&user.asymmetric_key)?,
                    user.is_blacklisted,
                    millis(&user.created_at),
                    millis(&user.updated_at),
                ],
            )
            .map_err(|e| on_conflict(e, || format!("email {}", user.email)))?;

            // One membership per organization; the first listed wins.
            for membership in &user.memberships {
                tx.execute(
                    "INSERT OR IGNORE INTO memberships (user_id, organization_id, is_admin, wrapped_key)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        id_blob(&user.id),
                        id_blob(&membership.organization_id),
                        membership.is_admin,
                        to_cbor(&membership.wrapped_org_key)?,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let email = email.clone();
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))?;
            let mut rows = stmt.query(params![email.as_str()])?;
            match rows.next()? {
                Some(row) => read_user(conn, row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        let id = *id;
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
            let mut rows = stmt.query(params![id_blob(&id)])?;
            match rows.next()? {
                Some(row) => read_user(conn, row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn push_membership(
        &self,
        email: &Email,
        membership: &OrganizationMembership,
    ) -> Result<UpdateResult> {
        let email = email.clone();
        let membership = membership.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let user_id: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    params![email.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(user_id) = user_id else {
                return Ok(UpdateResult::default());
            };

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO memberships (user_id, organization_id, is_admin, wrapped_key)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user_id,
                    id_blob(&membership.organization_id),
                    membership.is_admin,
                    to_cbor(&membership.wrapped_org_key)?,
                ],
            )?;

            if inserted > 0 {
                tx.execute(
                    "UPDATE users SET updated_at = ?1 WHERE id = ?2",
                    params![Utc::now().timestamp_millis(), user_id],
                )?;
            }
            tx.commit()?;

            Ok(UpdateResult {
                matched_count: 1,
                modified_count: inserted as u64,
            })
        })
        .await
    }

    async fn pull_memberships(&self, organization_id: &ObjectId) -> Result<UpdateResult> {
        let org = id_blob(organization_id);
        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let touched = tx.execute(
                "UPDATE users SET updated_at = ?1
                 WHERE id IN (SELECT user_id FROM memberships WHERE organization_id = ?2)",
                params![Utc::now().timestamp_millis(), org],
            )?;
            tx.execute(
                "DELETE FROM memberships WHERE organization_id = ?1",
                params![org],
            )?;
            tx.commit()?;

            Ok(UpdateResult {
                matched_count: touched as u64,
                modified_count: touched as u64,
            })
        })
        .await
    }

    async fn find_users_by_organization(
        &self,
        organization_id: &ObjectId,
        options: &FindOptions,
    ) -> Result<Cursor<User>> {
        let org = id_blob(organization_id);
        let options = *options;
        self.blocking(move |conn| {
            let conn: &Connection = conn;
            let mut values = vec![Value::Blob(org)];
            let sql = format!(
                "SELECT {} FROM users
                 WHERE id IN (SELECT user_id FROM memberships WHERE organization_id = ?1){}",
                USER_COLUMNS,
                page_clause(&options, &mut values)
            );
            collect_rows(conn, "users", &sql, values, |row| read_user(conn, row))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Organizations
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_organization(&self, organization: &Organization) -> Result<()> {
        let org = organization.clone();
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO organizations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    ORGANIZATION_COLUMNS
                ),
                params![
                    id_blob(&org.id),
                    org.name,
                    org.billing_email.as_ref().map(Email::as_str),
                    org.admin_email.as_str(),
                    to_cbor(&org.key_material)?,
                    millis(&org.created_at),
                    millis(&org.updated_at),
                ],
            )
            .map_err(|e| on_conflict(e, || format!("organization {}", org.id)))?;
            Ok(())
        })
        .await
    }

    async fn find_organization(&self, id: &ObjectId) -> Result<Option<Organization>> {
        let id = *id;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM organizations WHERE id = ?1",
                ORGANIZATION_COLUMNS
            ))?;
            let mut rows = stmt.query(params![id_blob(&id)])?;
            match rows.next()? {
                Some(row) => read_organization(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_organizations(&self, ids: &[ObjectId]) -> Result<Cursor<Organization>> {
        let ids = ids.to_vec();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM organizations WHERE id = ?1",
                ORGANIZATION_COLUMNS
            ))?;

            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                let mut rows = stmt.query(params![id_blob(id)])?;
                if let Some(row) = rows.next()? {
                    out.push(logged("organizations", read_organization(row)));
                }
            }
            Ok(out)
        })
        .await
    }

    async fn delete_organization(&self, id: &ObjectId) -> Result<u64> {
        let id = *id;
        self.blocking(move |conn| {
            let deleted =
                conn.execute("DELETE FROM organizations WHERE id = ?1", params![id_blob(&id)])?;
            Ok(deleted as u64)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invites
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_invite(&self, invite: &Invite) -> Result<()> {
        let invite = invite.clone();
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO invites ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    INVITE_COLUMNS
                ),
                params![
                    id_blob(&invite.id),
                    invite.from_email.as_str(),
                    invite.to_email.as_str(),
                    id_blob(&invite.organization_id),
                    millis(&invite.expires_at),
                    to_cbor(&invite.wrapped_key)?,
                    millis(&invite.created_at),
                    millis(&invite.updated_at),
                ],
            )
            .map_err(|e| on_conflict(e, || format!("invite {}", invite.id)))?;
            Ok(())
        })
        .await
    }

    async fn find_active_invite(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        let id = *id;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM invites WHERE id = ?1 AND expires_at > ?2",
                INVITE_COLUMNS
            ))?;
            let mut rows = stmt.query(params![id_blob(&id), millis(&now)])?;
            match rows.next()? {
                Some(row) => read_invite(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_invites(
        &self,
        filter: &InviteFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Invite>> {
        let filter = filter.clone();
        let options = *options;
        self.blocking(move |conn| {
            let mut values = Vec::new();
            let mut sql = format!("SELECT {} FROM invites WHERE ", INVITE_COLUMNS);

            match &filter.scope {
                InviteScope::Organization(org) => {
                    values.push(Value::Blob(id_blob(org)));
                    sql.push_str("organization_id = ?1");
                }
                InviteScope::Recipient(email) => {
                    values.push(Value::Text(email.as_str().to_string()));
                    sql.push_str("to_email = ?1");
                }
            }
            if let Some(now) = filter.active_at {
                values.push(Value::Integer(millis(&now)));
                sql.push_str(&format!(" AND expires_at > ?{}", values.len()));
            }
            sql.push_str(&page_clause(&options, &mut values));

            collect_rows(conn, "invites", &sql, values, read_invite)
        })
        .await
    }

    async fn delete_invite(&self, id: &ObjectId) -> Result<u64> {
        let id = *id;
        self.blocking(move |conn| {
            let deleted =
                conn.execute("DELETE FROM invites WHERE id = ?1", params![id_blob(&id)])?;
            Ok(deleted as u64)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Secrets
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_secret(&self, secret: &Secret) -> Result<()> {
        let secret = secret.clone();
        self.blocking(move |conn| insert_secret_row(conn, &secret))
            .await
    }

    async fn insert_secrets(&self, secrets: &[Secret]) -> Result<()> {
        let secrets = secrets.to_vec();
        self.blocking(move |conn| {
            // Dropping the transaction without commit rolls the batch back.
            let tx = conn.transaction()?;
            for secret in &secrets {
                insert_secret_row(&tx, secret)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_secret(&self, id: &ObjectId) -> Result<Option<Secret>> {
        let id = *id;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM secrets WHERE id = ?1",
                SECRET_COLUMNS
            ))?;
            let mut rows = stmt.query(params![id_blob(&id)])?;
            match rows.next()? {
                Some(row) => read_secret(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_secrets(
        &self,
        filter: &SecretFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Secret>> {
        let filter = filter.clone();
        let options = *options;
        self.blocking(move |conn| {
            let mut values = Vec::new();
            let mut conditions = Vec::new();

            for (column, id) in [
                ("user_id", filter.owner),
                ("organization_id", filter.organization_id),
                ("reference_key", filter.reference_key),
            ] {
                if let Some(id) = id {
                    values.push(Value::Blob(id_blob(&id)));
                    conditions.push(format!("{} = ?{}", column, values.len()));
                }
            }

            let mut sql = format!("SELECT {} FROM secrets", SECRET_COLUMNS);
            if !conditions.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }
            sql.push_str(&page_clause(&options, &mut values));

            collect_rows(conn, "secrets", &sql, values, read_secret)
        })
        .await
    }
}
