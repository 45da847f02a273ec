//! Contribution cycle table queries.

use super::{col_enum, col_ts, col_ts_opt, CircleStore};
use crate::error::{CoreError, CoreResult};
use crate::model::ContributionCycle;
use crate::types::{CycleId, CycleStatus, GroupId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const CYCLE_COLUMNS: &str = "cycle_id, group_id, cycle_number, status, recipient_id,
    scheduled_date, deadline, payout_date, created_at";

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<ContributionCycle> {
    Ok(ContributionCycle {
        cycle_id: row.get(0)?,
        group_id: row.get(1)?,
        cycle_number: row.get(2)?,
        status: col_enum(3, CycleStatus::parse(&row.get::<_, String>(3)?))?,
        recipient_id: row.get(4)?,
        scheduled_date: col_ts(5, row.get(5)?)?,
        deadline: col_ts(6, row.get(6)?)?,
        payout_date: col_ts_opt(7, row.get(7)?)?,
        created_at: col_ts(8, row.get(8)?)?,
    })
}

impl CircleStore {
    pub fn insert_cycle(&self, c: &ContributionCycle) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO contribution_cycles (
                cycle_id, group_id, cycle_number, status, recipient_id,
                scheduled_date, deadline, payout_date, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                &c.cycle_id,
                &c.group_id,
                c.cycle_number,
                c.status.as_str(),
                &c.recipient_id,
                c.scheduled_date.to_rfc3339(),
                c.deadline.to_rfc3339(),
                c.payout_date.map(|d| d.to_rfc3339()),
                c.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_cycle(&self, cycle_id: &CycleId) -> CoreResult<ContributionCycle> {
        let sql = format!("SELECT {CYCLE_COLUMNS} FROM contribution_cycles WHERE cycle_id = ?1");
        self.conn
            .query_row(&sql, params![cycle_id], cycle_from_row)
            .optional()?
            .ok_or_else(|| CoreError::NotFound(format!("cycle {cycle_id}")))
    }

    /// The group's current cycle, if one is open.
    pub fn pending_cycle(&self, group_id: &GroupId) -> CoreResult<Option<ContributionCycle>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM contribution_cycles
             WHERE group_id = ?1 AND status = 'pending'"
        );
        Ok(self
            .conn
            .query_row(&sql, params![group_id], cycle_from_row)
            .optional()?)
    }

    pub fn last_cycle_number(&self, group_id: &GroupId) -> CoreResult<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(cycle_number) FROM contribution_cycles WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    pub fn set_cycle_status(
        &self,
        cycle_id: &CycleId,
        status: CycleStatus,
        payout_date: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE contribution_cycles SET status = ?1, payout_date = ?2
             WHERE cycle_id = ?3",
            params![status.as_str(), payout_date.map(|d| d.to_rfc3339()), cycle_id],
        )?;
        Ok(())
    }

    /// Pending cycles past their deadline, for the scheduler sweep.
    pub fn expired_pending_cycles(
        &self,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<ContributionCycle>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM contribution_cycles
             WHERE status = 'pending' AND deadline < ?1
             ORDER BY deadline ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![now.to_rfc3339()], cycle_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn cycles_for_group(&self, group_id: &GroupId) -> CoreResult<Vec<ContributionCycle>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM contribution_cycles
             WHERE group_id = ?1 ORDER BY cycle_number ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], cycle_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn completed_cycle_count(&self, group_id: &GroupId) -> CoreResult<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM contribution_cycles
                 WHERE group_id = ?1 AND status = 'completed'",
                params![group_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Whether any cycle references this member, as recipient or as a
    /// contributor. Such members may only be soft-removed.
    pub fn member_referenced_by_cycles(
        &self,
        group_id: &GroupId,
        member_id: &UserId,
    ) -> CoreResult<bool> {
        let referenced: i64 = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM contribution_cycles
                  WHERE group_id = ?1 AND recipient_id = ?2)
              + (SELECT COUNT(*) FROM user_contributions
                  WHERE group_id = ?1 AND contributor_id = ?2)",
            params![group_id, member_id],
            |row| row.get(0),
        )?;
        Ok(referenced > 0)
    }
}
