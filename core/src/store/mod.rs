//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Policy and workflow code call store methods, never SQL.

mod approval;
mod tier;

use crate::error::CoreResult;
use crate::types::Amount;
use rusqlite::{types::Type, Connection, Row};
use std::str::FromStr;
use std::time::Duration;

pub struct AuthStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl AuthStore {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // Competing writers on the same record wait for the lock instead
        // of failing immediately.
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database
    /// (isolated). For file-based databases, this opens the same file.
    pub fn reopen(&self) -> CoreResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_tiers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/002_transfer_approvals.sql"))?;
        Ok(())
    }

    // ── Transition scope ───────────────────────────────────────

    /// Take the database write lock up front. Competing transitions on
    /// the same record queue behind it, so the status re-check that
    /// follows observes the winner's terminal state.
    pub fn begin_transition(&self) -> CoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    pub fn commit_transition(&self) -> CoreResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Best-effort; a connection that already lost its transaction is
    /// left alone.
    pub fn rollback_transition(&self) {
        let _ = self.conn.execute_batch("ROLLBACK;");
    }
}

pub(crate) fn amount_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Amount>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            Amount::from_str(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

pub(crate) fn required_amount_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Amount> {
    let raw: String = row.get(idx)?;
    Amount::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn bad_column(idx: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, detail.into())
}
