//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! string that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
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
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            tracing::info!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, gatepass_core::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Credentials table: one row per issued exit credential.
        -- Rows are audit records; they are updated once (the claim) and
        -- never deleted.
        CREATE TABLE credentials (
            credential_id BLOB PRIMARY KEY,   -- 16 random bytes
            order_ref TEXT NOT NULL,          -- paid order this authorizes
            holder_ref TEXT NOT NULL,         -- customer identity
            code TEXT NOT NULL UNIQUE,        -- presented secret
            issued_at INTEGER NOT NULL,       -- Unix ms
            expires_at INTEGER NOT NULL,      -- issued_at + TTL
            state TEXT NOT NULL DEFAULT 'pending',
            decided_by TEXT,                  -- NULL until decided; NULL for expired
            decided_at INTEGER                -- Unix ms of terminal transition
        );

        -- Indexes for common queries
        CREATE INDEX idx_credentials_order ON credentials(order_ref, state);
        CREATE INDEX idx_credentials_state_expiry ON credentials(state, expires_at);
        CREATE INDEX idx_credentials_decided ON credentials(decided_at);
        "#,
    )?;

    Ok(())
}
