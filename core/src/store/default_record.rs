//! User default record queries. Append-only audit data.

use super::{col_enum, col_ts, CircleStore};
use crate::error::{CoreError, CoreResult};
use crate::model::UserDefaultRecord;
use crate::types::{CycleId, DefaultReason, GroupId, UserId};
use rusqlite::{params, OptionalExtension, Row};

const DEFAULT_COLUMNS: &str = "default_id, user_id, reporter_id, group_id, cycle_id,
    reason, resolved, reported_at";

fn default_from_row(row: &Row<'_>) -> rusqlite::Result<UserDefaultRecord> {
    Ok(UserDefaultRecord {
        default_id: row.get(0)?,
        user_id: row.get(1)?,
        reporter_id: row.get(2)?,
        group_id: row.get(3)?,
        cycle_id: row.get(4)?,
        reason: col_enum(5, DefaultReason::parse(&row.get::<_, String>(5)?))?,
        resolved: row.get::<_, i32>(6)? != 0,
        reported_at: col_ts(7, row.get(7)?)?,
    })
}

impl CircleStore {
    pub fn insert_default(&self, d: &UserDefaultRecord) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO user_defaults (
                default_id, user_id, reporter_id, group_id, cycle_id,
                reason, resolved, reported_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                &d.default_id,
                &d.user_id,
                &d.reporter_id,
                &d.group_id,
                &d.cycle_id,
                d.reason.as_str(),
                d.resolved as i32,
                d.reported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_default(
        &self,
        user_id: &UserId,
        cycle_id: &CycleId,
        reason: DefaultReason,
    ) -> CoreResult<Option<UserDefaultRecord>> {
        let sql = format!(
            "SELECT {DEFAULT_COLUMNS} FROM user_defaults
             WHERE user_id = ?1 AND cycle_id = ?2 AND reason = ?3"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                params![user_id, cycle_id, reason.as_str()],
                default_from_row,
            )
            .optional()?)
    }

    pub fn get_default(&self, default_id: &str) -> CoreResult<UserDefaultRecord> {
        let sql = format!("SELECT {DEFAULT_COLUMNS} FROM user_defaults WHERE default_id = ?1");
        self.conn
            .query_row(&sql, params![default_id], default_from_row)
            .optional()?
            .ok_or_else(|| CoreError::NotFound(format!("default record {default_id}")))
    }

    /// Only `resolved` is mutable on a default record.
    pub fn mark_default_resolved(&self, default_id: &str) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE user_defaults SET resolved = 1 WHERE default_id = ?1",
            params![default_id],
        )?;
        Ok(())
    }

    pub fn defaults_for_group(&self, group_id: &GroupId) -> CoreResult<Vec<UserDefaultRecord>> {
        let sql = format!(
            "SELECT {DEFAULT_COLUMNS} FROM user_defaults
             WHERE group_id = ?1 ORDER BY reported_at ASC, default_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], default_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
