//! Group table queries.

use super::{col_enum, col_ts, col_ts_opt, CircleStore};
use crate::error::{CoreError, CoreResult};
use crate::model::Group;
use crate::types::{
    CustomFrequency, CustomUnit, Frequency, GroupId, GroupStatus, PayoutDay, PayoutPolicy,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const GROUP_COLUMNS: &str = "group_id, name, description, owner_id, target_member_count,
    contribution_minor, currency, payout_day, frequency, custom_step, custom_unit,
    payout_policy, is_public, repeat_rounds, start_immediately, status, open_slots,
    created_at, deleted_at";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    group_from_joined_row(row, 0)
}

/// Decode a group starting at column `base` (used by joined queries).
pub(crate) fn group_from_joined_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Group> {
    let custom_step: Option<u32> = row.get(base + 9)?;
    let custom_unit: Option<String> = row.get(base + 10)?;
    let custom_frequency = match (custom_step, custom_unit) {
        (Some(step), Some(unit)) => Some(CustomFrequency {
            step,
            unit: col_enum(base + 10, CustomUnit::parse(&unit))?,
        }),
        _ => None,
    };
    Ok(Group {
        group_id: row.get(base)?,
        name: row.get(base + 1)?,
        description: row.get(base + 2)?,
        owner_id: row.get(base + 3)?,
        target_member_count: row.get(base + 4)?,
        contribution_minor: row.get(base + 5)?,
        currency: row.get(base + 6)?,
        payout_day: col_enum(base + 7, PayoutDay::parse(&row.get::<_, String>(base + 7)?))?,
        frequency: col_enum(base + 8, Frequency::parse(&row.get::<_, String>(base + 8)?))?,
        custom_frequency,
        payout_policy: col_enum(
            base + 11,
            PayoutPolicy::parse(&row.get::<_, String>(base + 11)?),
        )?,
        is_public: row.get::<_, i32>(base + 12)? != 0,
        repeat_rounds: row.get::<_, i32>(base + 13)? != 0,
        start_immediately: row.get::<_, i32>(base + 14)? != 0,
        status: col_enum(base + 15, GroupStatus::parse(&row.get::<_, String>(base + 15)?))?,
        open_slots: row.get(base + 16)?,
        created_at: col_ts(base + 17, row.get(base + 17)?)?,
        deleted_at: col_ts_opt(base + 18, row.get(base + 18)?)?,
    })
}

impl CircleStore {
    pub fn insert_group(&self, g: &Group) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO groups (
                group_id, name, description, owner_id, target_member_count,
                contribution_minor, currency, payout_day, frequency,
                custom_step, custom_unit, payout_policy, is_public,
                repeat_rounds, start_immediately, status, open_slots,
                created_at, deleted_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                &g.group_id,
                &g.name,
                &g.description,
                &g.owner_id,
                g.target_member_count,
                g.contribution_minor,
                &g.currency,
                g.payout_day.as_str(),
                g.frequency.as_str(),
                g.custom_frequency.map(|c| c.step),
                g.custom_frequency.map(|c| c.unit.as_str()),
                g.payout_policy.as_str(),
                g.is_public as i32,
                g.repeat_rounds as i32,
                g.start_immediately as i32,
                g.status.as_str(),
                g.open_slots,
                g.created_at.to_rfc3339(),
                g.deleted_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Fetch a live (non-deleted) group or fail with NotFound.
    pub fn get_group(&self, group_id: &GroupId) -> CoreResult<Group> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM groups
             WHERE group_id = ?1 AND deleted_at IS NULL"
        );
        self.conn
            .query_row(&sql, params![group_id], group_from_row)
            .optional()?
            .ok_or_else(|| CoreError::NotFound(format!("group {group_id}")))
    }

    pub fn group_by_name(&self, name: &str) -> CoreResult<Option<Group>> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM groups
             WHERE name = ?1 COLLATE NOCASE AND deleted_at IS NULL"
        );
        Ok(self
            .conn
            .query_row(&sql, params![name], group_from_row)
            .optional()?)
    }

    pub fn set_group_status(&self, group_id: &GroupId, status: GroupStatus) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE groups SET status = ?1 WHERE group_id = ?2",
            params![status.as_str(), group_id],
        )?;
        Ok(())
    }

    pub fn update_group_profile(
        &self,
        group_id: &GroupId,
        name: &str,
        description: &str,
        is_public: bool,
        contribution_minor: i64,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE groups SET name = ?1, description = ?2, is_public = ?3,
                    contribution_minor = ?4
             WHERE group_id = ?5",
            params![name, description, is_public as i32, contribution_minor, group_id],
        )?;
        Ok(())
    }

    pub fn set_open_slots(&self, group_id: &GroupId, open_slots: u32) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE groups SET open_slots = ?1 WHERE group_id = ?2",
            params![open_slots, group_id],
        )?;
        Ok(())
    }

    pub fn soft_delete_group(&self, group_id: &GroupId, at: DateTime<Utc>) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE groups SET deleted_at = ?1 WHERE group_id = ?2 AND deleted_at IS NULL",
            params![at.to_rfc3339(), group_id],
        )?;
        Ok(())
    }

    /// Case-insensitive substring search over public groups, capped.
    pub fn search_public_groups(&self, fragment: &str, limit: u32) -> CoreResult<Vec<Group>> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM groups
             WHERE is_public = 1 AND deleted_at IS NULL
               AND name LIKE '%' || ?1 || '%' COLLATE NOCASE
             ORDER BY name ASC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![fragment.trim(), limit], group_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
