//! User contribution table queries.

use super::{col_enum, col_ts_opt, CircleStore};
use crate::error::{CoreError, CoreResult};
use crate::model::{SettlementSummary, UserContribution};
use crate::types::{ContributionStatus, CycleId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const CONTRIBUTION_COLUMNS: &str = "contribution_id, cycle_id, group_id, contributor_id,
    amount_minor, currency, status, paid_at";

fn contribution_from_row(row: &Row<'_>) -> rusqlite::Result<UserContribution> {
    Ok(UserContribution {
        contribution_id: row.get(0)?,
        cycle_id: row.get(1)?,
        group_id: row.get(2)?,
        contributor_id: row.get(3)?,
        amount_minor: row.get(4)?,
        currency: row.get(5)?,
        status: col_enum(6, ContributionStatus::parse(&row.get::<_, String>(6)?))?,
        paid_at: col_ts_opt(7, row.get(7)?)?,
    })
}

impl CircleStore {
    pub fn insert_contribution(&self, c: &UserContribution) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO user_contributions (
                contribution_id, cycle_id, group_id, contributor_id,
                amount_minor, currency, status, paid_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                &c.contribution_id,
                &c.cycle_id,
                &c.group_id,
                &c.contributor_id,
                c.amount_minor,
                &c.currency,
                c.status.as_str(),
                c.paid_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn contribution(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
    ) -> CoreResult<Option<UserContribution>> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM user_contributions
             WHERE cycle_id = ?1 AND contributor_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![cycle_id, contributor_id], contribution_from_row)
            .optional()?)
    }

    pub fn require_contribution(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
    ) -> CoreResult<UserContribution> {
        self.contribution(cycle_id, contributor_id)?.ok_or_else(|| {
            CoreError::NotFound(format!(
                "contribution of {contributor_id} for cycle {cycle_id}"
            ))
        })
    }

    pub fn set_contribution_status(
        &self,
        contribution_id: &str,
        status: ContributionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        self.conn.execute(
            "UPDATE user_contributions SET status = ?1, paid_at = ?2
             WHERE contribution_id = ?3",
            params![status.as_str(), paid_at.map(|d| d.to_rfc3339()), contribution_id],
        )?;
        Ok(())
    }

    pub fn contributions_for_cycle(
        &self,
        cycle_id: &CycleId,
    ) -> CoreResult<Vec<UserContribution>> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM user_contributions
             WHERE cycle_id = ?1 ORDER BY contributor_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cycle_id], contribution_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Contributions still owed for a cycle (not paid, not defaulted).
    pub fn unpaid_contributions(&self, cycle_id: &CycleId) -> CoreResult<Vec<UserContribution>> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM user_contributions
             WHERE cycle_id = ?1 AND status IN ('not_paid', 'not_confirmed')
             ORDER BY contributor_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cycle_id], contribution_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn settlement_summary(&self, cycle_id: &CycleId) -> CoreResult<SettlementSummary> {
        self.conn
            .query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0),
                    COUNT(*)
                 FROM user_contributions WHERE cycle_id = ?1",
                params![cycle_id],
                |row| {
                    Ok(SettlementSummary {
                        paid_count: row.get(0)?,
                        total_count: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}
