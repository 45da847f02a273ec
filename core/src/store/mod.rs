//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Services call store methods — they never execute SQL directly.
//!
//! Multi-entity invariants (group + admin membership creation, order
//! assignment, cycle opening with its batch of contributions, cycle
//! closure) run inside `with_tx`, which commits on success and rolls
//! back on every error path. Uniqueness constraints are enforced by
//! indexes in the migrations, not only in application logic.

mod contribution;
mod cycle;
mod default_record;
mod group;
mod membership;

use crate::error::CoreResult;
use crate::event::{DomainEvent, EventLogEntry};
use crate::types::GroupId;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

pub struct CircleStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl CircleStore {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
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

    /// Reopen a new connection to the same database. In-memory stores
    /// get a fresh, isolated database.
    pub fn reopen(&self) -> CoreResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_groups.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_memberships.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_cycles.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_contributions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_user_defaults.sql"))?;
        Ok(())
    }

    /// Run `f` inside a transaction: commit on Ok, roll back on Err.
    /// Store methods called within `f` execute on the same connection,
    /// so they all land inside the transaction. Not reentrant — callers
    /// must not nest.
    pub fn with_tx<T>(&self, f: impl FnOnce(&CircleStore) -> CoreResult<T>) -> CoreResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        match f(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback()?;
                Err(err)
            }
        }
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &DomainEvent, at: DateTime<Utc>) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (group_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.group_id(),
                event.event_type(),
                serde_json::to_string(event)?,
                at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_group(&self, group_id: &GroupId) -> CoreResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_id, event_type, payload, created_at
             FROM event_log WHERE group_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![group_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    group_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: col_ts(4, row.get(4)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, group_id: &GroupId, event_type: &str) -> CoreResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM event_log WHERE group_id = ?1 AND event_type = ?2",
                params![group_id, event_type],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

// ── Column decoding helpers ────────────────────────────────────

/// Decode an RFC 3339 timestamp column.
pub(crate) fn col_ts(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn col_ts_opt(
    idx: usize,
    s: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| col_ts(idx, s)).transpose()
}

/// Decode a closed-enum column via its `parse` function.
pub(crate) fn col_enum<T>(idx: usize, parsed: CoreResult<T>) -> rusqlite::Result<T> {
    parsed.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
