//! Contribution cycle engine.
//!
//! State machine per group:
//!   NotStarted → Pending(n) → Completed(n) → Pending(n+1) → … → RoundComplete
//!
//! RoundComplete either finishes the group (status completed) or, for
//! repeat-enabled groups, rolls straight into the next cycle. Cycle
//! numbers continue across rounds and never reset; recipients rotate
//! over the occupied payout slots in slot order, so a round is one
//! payout per slot holder.
//!
//! Opening and closing a cycle are multi-entity writes and run inside
//! one transaction each; the partial unique index on pending cycles
//! backstops the at-most-one-pending rule against concurrent opens.

use crate::config::CoreConfig;
use crate::default_tracker::report_default_in_tx;
use crate::error::{CoreError, CoreResult};
use crate::event::DomainEvent;
use crate::model::{ContributionCycle, UserContribution};
use crate::payout_order;
use crate::schedule;
use crate::store::CircleStore;
use crate::types::{
    new_id, ContributionStatus, CycleId, CycleStatus, DefaultReason, GroupId, GroupStatus, Money,
    UserId,
};
use chrono::{DateTime, Utc};
use log::{info, warn};

pub struct CycleEngine<'a> {
    store: &'a CircleStore,
    config: &'a CoreConfig,
}

impl<'a> CycleEngine<'a> {
    pub fn new(store: &'a CircleStore, config: &'a CoreConfig) -> Self {
        Self { store, config }
    }

    /// Open the group's next cycle: resolve the recipient, create the
    /// cycle row and one not_paid contribution per active member —
    /// including the recipient, who pays into their own pot.
    pub fn open_cycle(
        &self,
        group_id: &GroupId,
        now: DateTime<Utc>,
    ) -> CoreResult<ContributionCycle> {
        self.store
            .with_tx(|store| self.open_cycle_in_tx(store, group_id, now))
    }

    /// Record a full payment for one member's obligation. Partial
    /// payments are not supported.
    pub fn record_payment(
        &self,
        cycle_id: &CycleId,
        contributor_id: &UserId,
        amount: &Money,
    ) -> CoreResult<UserContribution> {
        self.store.with_tx(|store| {
            let cycle = store.get_cycle(cycle_id)?;
            if cycle.status != CycleStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "cycle {cycle_id} is {} and no longer accepts payments",
                    cycle.status.as_str()
                )));
            }
            let contribution = store.require_contribution(cycle_id, contributor_id)?;
            if contribution.currency != amount.currency {
                return Err(CoreError::Validation(format!(
                    "payment currency {} does not match the group's {}",
                    amount.currency, contribution.currency
                )));
            }
            if contribution.amount_minor != amount.minor {
                return Err(CoreError::AmountMismatch {
                    expected: contribution.amount_minor,
                    actual: amount.minor,
                });
            }
            if !contribution.status.can_transition_to(ContributionStatus::Paid) {
                return Err(CoreError::InvalidState(format!(
                    "contribution of {contributor_id} for cycle {cycle_id} is already {}",
                    contribution.status.as_str()
                )));
            }

            let now = Utc::now();
            store.set_contribution_status(
                &contribution.contribution_id,
                ContributionStatus::Paid,
                Some(now),
            )?;
            store.append_event(
                &DomainEvent::ContributionRecorded {
                    group_id: cycle.group_id.clone(),
                    cycle_id: cycle_id.clone(),
                    contributor_id: contributor_id.clone(),
                    amount_minor: amount.minor,
                    currency: amount.currency.clone(),
                },
                now,
            )?;
            store.require_contribution(cycle_id, contributor_id)
        })
    }

    /// Attempt to close a cycle. Fully settled cycles complete and the
    /// next one opens (or the round ends); cycles past their deadline
    /// turn delayed and every unpaid contributor is flagged. Anything
    /// else stays pending.
    pub fn try_close_cycle(
        &self,
        cycle_id: &CycleId,
        now: DateTime<Utc>,
    ) -> CoreResult<CycleStatus> {
        self.store
            .with_tx(|store| self.try_close_in_tx(store, cycle_id, now))
    }

    /// Scheduler entry point: close out every pending cycle whose
    /// deadline has passed. Returns how many cycles left pending state.
    pub fn sweep_expired_cycles(&self, now: DateTime<Utc>) -> CoreResult<u32> {
        let expired = self.store.expired_pending_cycles(now)?;
        let mut transitioned = 0;
        for cycle in expired {
            match self.try_close_cycle(&cycle.cycle_id, now)? {
                CycleStatus::Pending => {}
                _ => transitioned += 1,
            }
        }
        Ok(transitioned)
    }

    // ── Transactional internals ────────────────────────────────

    fn open_cycle_in_tx(
        &self,
        store: &CircleStore,
        group_id: &GroupId,
        now: DateTime<Utc>,
    ) -> CoreResult<ContributionCycle> {
        let group = store.get_group(group_id)?;
        if group.status != GroupStatus::Active {
            return Err(CoreError::Precondition(format!(
                "group {group_id} is {}, cycles require an active group",
                group.status.as_str()
            )));
        }
        if store.pending_cycle(group_id)?.is_some() {
            return Err(CoreError::InvalidState(format!(
                "group {group_id} already has an open cycle"
            )));
        }

        let cycle_number = store.last_cycle_number(group_id)? + 1;
        let recipient = payout_order::next_recipient(store, &group, cycle_number)?;

        // Periods chain off the previous cycle's schedule so a late
        // closure does not drift the whole calendar.
        let base = store
            .cycles_for_group(group_id)?
            .last()
            .map(|prior| prior.scheduled_date.max(now))
            .unwrap_or(now);
        let scheduled_date = schedule::next_payout_date(
            base,
            group.frequency,
            group.custom_frequency,
            group.payout_day,
        )?;
        let deadline = schedule::cycle_deadline(scheduled_date, self.config.cycle_grace_days);

        let cycle = ContributionCycle {
            cycle_id: new_id(),
            group_id: group_id.clone(),
            cycle_number,
            status: CycleStatus::Pending,
            recipient_id: recipient.member_id.clone(),
            scheduled_date,
            deadline,
            payout_date: None,
            created_at: now,
        };
        store.insert_cycle(&cycle).map_err(|err| {
            if err.is_unique_violation() {
                CoreError::InvalidState(format!(
                    "group {group_id} already has an open cycle"
                ))
            } else {
                err
            }
        })?;

        let members = store.contributing_members(group_id)?;
        if members.is_empty() {
            return Err(CoreError::Precondition(format!(
                "group {group_id} has no active members to contribute"
            )));
        }
        for member in &members {
            store.insert_contribution(&UserContribution {
                contribution_id: new_id(),
                cycle_id: cycle.cycle_id.clone(),
                group_id: group_id.clone(),
                contributor_id: member.member_id.clone(),
                amount_minor: group.contribution_minor,
                currency: group.currency.clone(),
                status: ContributionStatus::NotPaid,
                paid_at: None,
            })?;
        }

        store.append_event(
            &DomainEvent::CycleOpened {
                group_id: group_id.clone(),
                cycle_id: cycle.cycle_id.clone(),
                cycle_number,
                recipient_id: recipient.member_id.clone(),
                scheduled_date,
            },
            now,
        )?;
        store.append_event(
            &DomainEvent::PayoutDue {
                group_id: group_id.clone(),
                cycle_id: cycle.cycle_id.clone(),
                recipient_id: recipient.member_id.clone(),
                amount_minor: group.contribution_minor * members.len() as i64,
                currency: group.currency.clone(),
            },
            now,
        )?;
        info!(
            "opened cycle {cycle_number} for group {group_id}, paying out to {}",
            recipient.member_id
        );
        Ok(cycle)
    }

    fn try_close_in_tx(
        &self,
        store: &CircleStore,
        cycle_id: &CycleId,
        now: DateTime<Utc>,
    ) -> CoreResult<CycleStatus> {
        let cycle = store.get_cycle(cycle_id)?;
        if cycle.status != CycleStatus::Pending {
            return Err(CoreError::InvalidState(format!(
                "cycle {cycle_id} is {}, only pending cycles can close",
                cycle.status.as_str()
            )));
        }
        let group = store.get_group(&cycle.group_id)?;
        let summary = store.settlement_summary(cycle_id)?;

        if summary.all_paid() {
            store.set_cycle_status(cycle_id, CycleStatus::Completed, Some(now))?;
            store.append_event(
                &DomainEvent::CycleCompleted {
                    group_id: cycle.group_id.clone(),
                    cycle_id: cycle_id.clone(),
                    cycle_number: cycle.cycle_number,
                    recipient_id: cycle.recipient_id.clone(),
                },
                now,
            )?;
            info!(
                "cycle {} of group {} settled ({}/{} paid)",
                cycle.cycle_number, cycle.group_id, summary.paid_count, summary.total_count
            );

            let rotation_len = store.slot_holders(&cycle.group_id)?.len() as u32;
            let round_complete =
                rotation_len > 0 && cycle.cycle_number % rotation_len == 0;
            if round_complete {
                store.append_event(
                    &DomainEvent::RoundCompleted {
                        group_id: cycle.group_id.clone(),
                        last_cycle_number: cycle.cycle_number,
                        repeats: group.repeat_rounds,
                    },
                    now,
                )?;
                if group.repeat_rounds {
                    self.open_cycle_in_tx(store, &cycle.group_id, now)?;
                } else {
                    store.set_group_status(&cycle.group_id, GroupStatus::Completed)?;
                    store.append_event(
                        &DomainEvent::GroupCompleted {
                            group_id: cycle.group_id.clone(),
                            cycles_completed: store.completed_cycle_count(&cycle.group_id)?,
                        },
                        now,
                    )?;
                    info!("group {} completed its round", cycle.group_id);
                }
            } else {
                self.open_cycle_in_tx(store, &cycle.group_id, now)?;
            }
            return Ok(CycleStatus::Completed);
        }

        if now > cycle.deadline {
            store.set_cycle_status(cycle_id, CycleStatus::Delayed, None)?;
            let unpaid = store.unpaid_contributions(cycle_id)?;
            for contribution in &unpaid {
                store.set_contribution_status(
                    &contribution.contribution_id,
                    ContributionStatus::Defaulted,
                    contribution.paid_at,
                )?;
                report_default_in_tx(
                    store,
                    &contribution.contributor_id,
                    &group.owner_id,
                    &cycle.group_id,
                    cycle_id,
                    DefaultReason::MissedContribution,
                )?;
            }
            store.append_event(
                &DomainEvent::CycleDelayed {
                    group_id: cycle.group_id.clone(),
                    cycle_id: cycle_id.clone(),
                    cycle_number: cycle.cycle_number,
                    unpaid_count: unpaid.len() as u32,
                },
                now,
            )?;
            warn!(
                "cycle {} of group {} passed its deadline with {} unpaid members",
                cycle.cycle_number,
                cycle.group_id,
                unpaid.len()
            );
            return Ok(CycleStatus::Delayed);
        }

        Ok(CycleStatus::Pending)
    }
}
