//! SQLite implementation of the CredentialStore trait.
//!
//! This is the primary storage backend for gatepass. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking. The atomic
//! claim is a single conditional UPDATE; SQLite's serialized writes make it
//! a linearizable compare-and-set on the credential row.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use gatepass_core::{
    Credential, CredentialId, CredentialState, ExitCode, OrderRef, Outcome, PartyId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ClaimResult, CredentialStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
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
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock_poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", e)),
    ))
}

fn join_failed(e: tokio::task::JoinError) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
        Some(format!("spawn_blocking failed: {}", e)),
    ))
}

// Helper to convert a row to Credential.
//
// Column order must match CREDENTIAL_COLUMNS.
const CREDENTIAL_COLUMNS: &str =
    "credential_id, order_ref, holder_ref, code, issued_at, expires_at, state, decided_by, decided_at";

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credential> {
    let id_bytes: Vec<u8> = row.get("credential_id")?;
    let order_ref: String = row.get("order_ref")?;
    let holder_ref: String = row.get("holder_ref")?;
    let code: String = row.get("code")?;
    let state: String = row.get("state")?;
    let decided_by: Option<String> = row.get("decided_by")?;

    let id = CredentialId::from_bytes(id_bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            0,
            "credential_id".into(),
            rusqlite::types::Type::Blob,
        )
    })?);

    let code = ExitCode::parse(&code).map_err(|_| {
        rusqlite::Error::InvalidColumnType(3, "code".into(), rusqlite::types::Type::Text)
    })?;

    let state = CredentialState::from_str(&state).map_err(|_| {
        rusqlite::Error::InvalidColumnType(6, "state".into(), rusqlite::types::Type::Text)
    })?;

    Ok(Credential {
        id,
        order_ref: OrderRef(order_ref),
        holder_ref: PartyId(holder_ref),
        code,
        issued_at: row.get("issued_at")?,
        expires_at: row.get("expires_at")?,
        state,
        decided_by: decided_by.map(PartyId),
        decided_at: row.get("decided_at")?,
    })
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert(&self, credential: &Credential) -> Result<()> {
        let credential = credential.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM credentials WHERE credential_id = ?1 OR code = ?2",
                    params![credential.id.as_bytes().as_slice(), credential.code.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Err(StoreError::DuplicateCredential(credential.id.to_hex()));
            }

            conn.execute(
                "INSERT INTO credentials (
                    credential_id, order_ref, holder_ref, code,
                    issued_at, expires_at, state, decided_by, decided_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    credential.id.as_bytes().as_slice(),
                    credential.order_ref.as_str(),
                    credential.holder_ref.as_str(),
                    credential.code.as_str(),
                    credential.issued_at,
                    credential.expires_at,
                    credential.state.as_str(),
                    credential.decided_by.as_ref().map(|p| p.as_str()),
                    credential.decided_at,
                ],
            )?;

            Ok(())
        })
        .await
        .map_err(join_failed)?
    }

    async fn find_active(&self, order_ref: &OrderRef, now: i64) -> Result<Option<Credential>> {
        let order_ref = order_ref.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            conn.query_row(
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials
                     WHERE order_ref = ?1 AND state = 'pending' AND expires_at >= ?2
                     ORDER BY issued_at DESC LIMIT 1"
                ),
                params![order_ref.as_str(), now],
                row_to_credential,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
        .map_err(join_failed)?
    }

    async fn get_by_code(&self, code: &ExitCode) -> Result<Option<Credential>> {
        let code = code.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            conn.query_row(
                &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE code = ?1"),
                params![code.as_str()],
                row_to_credential,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
        .map_err(join_failed)?
    }

    async fn claim(
        &self,
        code: &ExitCode,
        outcome: Outcome,
        decided_by: Option<&PartyId>,
        now: i64,
    ) -> Result<ClaimResult> {
        let code = code.clone();
        let decided_by = decided_by.cloned();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            // The whole transition is one conditional UPDATE. The state
            // guard makes it first-writer-wins; the CASE on expiry forces
            // Expired inside the same write, which closes the race between
            // a last-second scan and the reaper.
            let updated = conn.execute(
                "UPDATE credentials SET
                    state = CASE WHEN expires_at < ?2 THEN 'expired' ELSE ?3 END,
                    decided_by = CASE WHEN expires_at < ?2 THEN NULL ELSE ?4 END,
                    decided_at = ?2
                 WHERE code = ?1 AND state = 'pending'",
                params![
                    code.as_str(),
                    now,
                    outcome.target_state().as_str(),
                    decided_by.as_ref().map(|p| p.as_str()),
                ],
            )?;

            let row = conn
                .query_row(
                    &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE code = ?1"),
                    params![code.as_str()],
                    row_to_credential,
                )
                .optional()?;

            match (updated, row) {
                (_, None) => Ok(ClaimResult::NotFound),
                (1, Some(credential)) => Ok(ClaimResult::Claimed(credential)),
                (0, Some(credential)) => Ok(ClaimResult::AlreadyDecided(credential)),
                (n, Some(_)) => Err(StoreError::InvalidData(format!(
                    "claim updated {} rows for one code",
                    n
                ))),
            }
        })
        .await
        .map_err(join_failed)?
    }

    async fn list_pending(&self, now: i64) -> Result<Vec<Credential>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials
                 WHERE state = 'pending' AND expires_at >= ?1
                 ORDER BY issued_at DESC"
            ))?;

            let credentials = stmt
                .query_map(params![now], row_to_credential)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(credentials)
        })
        .await
        .map_err(join_failed)?
    }

    async fn expired_pending(&self, now: i64) -> Result<Vec<Credential>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials
                 WHERE state = 'pending' AND expires_at < ?1
                 ORDER BY expires_at"
            ))?;

            let credentials = stmt
                .query_map(params![now], row_to_credential)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(credentials)
        })
        .await
        .map_err(join_failed)?
    }

    async fn history(&self, limit: u32, offset: u32) -> Result<Vec<Credential>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_poisoned)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials
                 WHERE state != 'pending'
                 ORDER BY decided_at DESC
                 LIMIT ?1 OFFSET ?2"
            ))?;

            let credentials = stmt
                .query_map(params![limit, offset], row_to_credential)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(credentials)
        })
        .await
        .map_err(join_failed)?
    }
}
