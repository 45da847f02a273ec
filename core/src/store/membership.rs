//! Membership table queries.

use super::{col_enum, col_ts, col_ts_opt, CircleStore};
use crate::config::Page;
use crate::error::{CoreError, CoreResult};
use crate::model::{Group, Membership};
use crate::types::{GroupId, MemberRole, MemberStatus, MembershipId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const MEMBER_COLUMNS: &str = "membership_id, group_id, member_id, role, status,
    payout_order, member_since, removed_at";

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        membership_id: row.get(0)?,
        group_id: row.get(1)?,
        member_id: row.get(2)?,
        role: col_enum(3, MemberRole::parse(&row.get::<_, String>(3)?))?,
        status: col_enum(4, MemberStatus::parse(&row.get::<_, String>(4)?))?,
        payout_order: row.get(5)?,
        member_since: col_ts(6, row.get(6)?)?,
        removed_at: col_ts_opt(7, row.get(7)?)?,
    })
}

impl CircleStore {
    pub fn insert_membership(&self, m: &Membership) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO memberships (
                membership_id, group_id, member_id, role, status,
                payout_order, member_since, removed_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                &m.membership_id,
                &m.group_id,
                &m.member_id,
                m.role.as_str(),
                m.status.as_str(),
                m.payout_order,
                m.member_since.to_rfc3339(),
                m.removed_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn membership(
        &self,
        group_id: &GroupId,
        member_id: &UserId,
    ) -> CoreResult<Option<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND member_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![group_id, member_id], membership_from_row)
            .optional()?)
    }

    pub fn require_membership(
        &self,
        group_id: &GroupId,
        member_id: &UserId,
    ) -> CoreResult<Membership> {
        self.membership(group_id, member_id)?.ok_or_else(|| {
            CoreError::NotFound(format!("membership of {member_id} in group {group_id}"))
        })
    }

    /// Members occupying a slot: not yet removed, any status. Pending
    /// joins hold their reservation so the group cannot oversubscribe.
    pub fn occupied_slot_count(&self, group_id: &GroupId) -> CoreResult<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM memberships
                 WHERE group_id = ?1 AND removed_at IS NULL",
                params![group_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn active_member_count(&self, group_id: &GroupId) -> CoreResult<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM memberships
                 WHERE group_id = ?1 AND status = 'active' AND removed_at IS NULL",
                params![group_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Memberships that owe a contribution when a cycle opens.
    pub fn contributing_members(&self, group_id: &GroupId) -> CoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND status = 'active' AND removed_at IS NULL
             ORDER BY payout_order ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], membership_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn membership_by_order(
        &self,
        group_id: &GroupId,
        payout_order: u32,
    ) -> CoreResult<Option<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND payout_order = ?2 AND removed_at IS NULL"
        );
        Ok(self
            .conn
            .query_row(&sql, params![group_id, payout_order], membership_from_row)
            .optional()?)
    }

    /// Members currently holding a payout slot, in slot order. This is
    /// the rotation: recipients are drawn from it by cycle number.
    pub fn slot_holders(&self, group_id: &GroupId) -> CoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND payout_order IS NOT NULL AND removed_at IS NULL
             ORDER BY payout_order ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], membership_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn taken_orders(&self, group_id: &GroupId) -> CoreResult<Vec<u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT payout_order FROM memberships
             WHERE group_id = ?1 AND payout_order IS NOT NULL
             ORDER BY payout_order ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Active non-admin members still waiting for a payout slot
    /// (random policy before activation), in join order.
    pub fn unassigned_members(&self, group_id: &GroupId) -> CoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND role = 'member' AND payout_order IS NULL
               AND status = 'active' AND removed_at IS NULL
             ORDER BY member_since ASC, membership_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], membership_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_payout_order(
        &self,
        membership_id: &MembershipId,
        payout_order: u32,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE memberships SET payout_order = ?1 WHERE membership_id = ?2",
            params![payout_order, membership_id],
        )?;
        Ok(())
    }

    pub fn set_member_status(
        &self,
        membership_id: &MembershipId,
        status: MemberStatus,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE memberships SET status = ?1 WHERE membership_id = ?2",
            params![status.as_str(), membership_id],
        )?;
        Ok(())
    }

    pub fn soft_remove_membership(
        &self,
        membership_id: &MembershipId,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE memberships SET removed_at = ?1 WHERE membership_id = ?2",
            params![at.to_rfc3339(), membership_id],
        )?;
        Ok(())
    }

    pub fn delete_membership(&self, membership_id: &MembershipId) -> CoreResult<()> {
        self.conn.execute(
            "DELETE FROM memberships WHERE membership_id = ?1",
            params![membership_id],
        )?;
        Ok(())
    }

    pub fn list_members(
        &self,
        group_id: &GroupId,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
        page: Page,
    ) -> CoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM memberships
             WHERE group_id = ?1 AND removed_at IS NULL
               AND (?2 IS NULL OR role = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY member_since DESC, membership_id DESC
             LIMIT ?4 OFFSET ?5"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                group_id,
                role.map(MemberRole::as_str),
                status.map(MemberStatus::as_str),
                page.size,
                page.offset(),
            ],
            membership_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Groups the user belongs to (active memberships), joined to their
    /// group rows, newest membership first.
    pub fn list_user_groups(
        &self,
        member_id: &UserId,
        role: Option<MemberRole>,
        page: Page,
    ) -> CoreResult<Vec<(Membership, Group)>> {
        let sql = format!(
            "SELECT m.membership_id, m.group_id, m.member_id, m.role, m.status,
                    m.payout_order, m.member_since, m.removed_at,
                    g.group_id, g.name, g.description, g.owner_id, g.target_member_count,
                    g.contribution_minor, g.currency, g.payout_day, g.frequency,
                    g.custom_step, g.custom_unit, g.payout_policy, g.is_public,
                    g.repeat_rounds, g.start_immediately, g.status, g.open_slots,
                    g.created_at, g.deleted_at
             FROM memberships m
             JOIN groups g ON g.group_id = m.group_id AND g.deleted_at IS NULL
             WHERE m.member_id = ?1 AND m.status = 'active' AND m.removed_at IS NULL
               AND (?2 IS NULL OR m.role = ?2)
             ORDER BY m.member_since DESC, m.membership_id DESC
             LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                member_id,
                role.map(MemberRole::as_str),
                page.size,
                page.offset()
            ],
            |row| {
                let membership = membership_from_row(row)?;
                let group = super::group::group_from_joined_row(row, 8)?;
                Ok((membership, group))
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
