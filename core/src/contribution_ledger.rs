//! Contribution ledger: per-member, per-cycle payment status with
//! monotonic transitions. (contributor, cycle) uniqueness lives in the
//! storage index; this layer guards the transition order.

use crate::error::{CoreError, CoreResult};
use crate::model::{SettlementSummary, UserContribution};
use crate::store::CircleStore;
use crate::types::{ContributionStatus, CycleId, UserId};
use chrono::Utc;

pub struct ContributionLedger<'a> {
    store: &'a CircleStore,
}

impl<'a> ContributionLedger<'a> {
    pub fn new(store: &'a CircleStore) -> Self {
        Self { store }
    }

    /// Member reports having sent their payment: not_paid →
    /// not_confirmed.
    pub fn claim_payment(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
    ) -> CoreResult<UserContribution> {
        self.transition(cycle_id, contributor_id, ContributionStatus::NotConfirmed, false)
    }

    /// Admin confirms receipt: → paid, stamping paid_at.
    pub fn confirm_payment(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
    ) -> CoreResult<UserContribution> {
        self.transition(cycle_id, contributor_id, ContributionStatus::Paid, true)
    }

    /// Terminal: the obligation was never met for this cycle.
    pub fn mark_defaulted(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
    ) -> CoreResult<UserContribution> {
        self.transition(cycle_id, contributor_id, ContributionStatus::Defaulted, false)
    }

    /// Read-only aggregate used by the cycle engine's close check.
    pub fn settlement_summary(&self, cycle_id: &CycleId) -> CoreResult<SettlementSummary> {
        self.store.settlement_summary(cycle_id)
    }

    pub fn contributions_for_cycle(&self, cycle_id: &CycleId) -> CoreResult<Vec<UserContribution>> {
        self.store.contributions_for_cycle(cycle_id)
    }

    fn transition(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
        next: ContributionStatus,
        stamp_paid_at: bool,
    ) -> CoreResult<UserContribution> {
        self.store.with_tx(|store| {
            let contribution = store.require_contribution(cycle_id, contributor_id)?;
            if !contribution.status.can_transition_to(next) {
                return Err(CoreError::InvalidState(format!(
                    "contribution of {contributor_id} for cycle {cycle_id} is {} and cannot become {}",
                    contribution.status.as_str(),
                    next.as_str()
                )));
            }
            let paid_at = if stamp_paid_at {
                Some(Utc::now())
            } else {
                contribution.paid_at
            };
            store.set_contribution_status(&contribution.contribution_id, next, paid_at)?;
            store.require_contribution(cycle_id, contributor_id)
        })
    }
}
