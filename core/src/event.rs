//! Domain events emitted by the core for the external notifier.
//!
//! Events are appended to the `event_log` table inside the same
//! transaction as the state change they describe, and also returned to
//! the caller. The core never calls notification APIs directly.

use crate::types::{CycleId, GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    GroupCreated {
        group_id: GroupId,
        owner_id: UserId,
        name: String,
    },
    GroupActivated {
        group_id: GroupId,
        member_count: u32,
    },
    GroupCancelled {
        group_id: GroupId,
    },
    GroupCompleted {
        group_id: GroupId,
        cycles_completed: u32,
    },
    MemberJoined {
        group_id: GroupId,
        member_id: UserId,
        open_slots: u32,
    },
    MemberApproved {
        group_id: GroupId,
        member_id: UserId,
        payout_order: Option<u32>,
    },
    MemberRemoved {
        group_id: GroupId,
        member_id: UserId,
    },
    CycleOpened {
        group_id: GroupId,
        cycle_id: CycleId,
        cycle_number: u32,
        recipient_id: UserId,
        scheduled_date: DateTime<Utc>,
    },
    ContributionRecorded {
        group_id: GroupId,
        cycle_id: CycleId,
        contributor_id: UserId,
        amount_minor: i64,
        currency: String,
    },
    CycleCompleted {
        group_id: GroupId,
        cycle_id: CycleId,
        cycle_number: u32,
        recipient_id: UserId,
    },
    /// A cycle passed its deadline without full settlement.
    CycleDelayed {
        group_id: GroupId,
        cycle_id: CycleId,
        cycle_number: u32,
        unpaid_count: u32,
    },
    PayoutDue {
        group_id: GroupId,
        cycle_id: CycleId,
        recipient_id: UserId,
        amount_minor: i64,
        currency: String,
    },
    /// One full round of payouts finished; repeat groups roll on.
    RoundCompleted {
        group_id: GroupId,
        last_cycle_number: u32,
        repeats: bool,
    },
    MemberDefaulted {
        group_id: GroupId,
        cycle_id: CycleId,
        member_id: UserId,
        reason: String,
    },
    DefaultResolved {
        group_id: GroupId,
        member_id: UserId,
        default_id: String,
    },
}

impl DomainEvent {
    /// Stable snake_case discriminant, used as the `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::GroupCreated { .. } => "group_created",
            DomainEvent::GroupActivated { .. } => "group_activated",
            DomainEvent::GroupCancelled { .. } => "group_cancelled",
            DomainEvent::GroupCompleted { .. } => "group_completed",
            DomainEvent::MemberJoined { .. } => "member_joined",
            DomainEvent::MemberApproved { .. } => "member_approved",
            DomainEvent::MemberRemoved { .. } => "member_removed",
            DomainEvent::CycleOpened { .. } => "cycle_opened",
            DomainEvent::ContributionRecorded { .. } => "contribution_recorded",
            DomainEvent::CycleCompleted { .. } => "cycle_completed",
            DomainEvent::CycleDelayed { .. } => "cycle_delayed",
            DomainEvent::PayoutDue { .. } => "payout_due",
            DomainEvent::RoundCompleted { .. } => "round_completed",
            DomainEvent::MemberDefaulted { .. } => "member_defaulted",
            DomainEvent::DefaultResolved { .. } => "default_resolved",
        }
    }

    pub fn group_id(&self) -> &GroupId {
        match self {
            DomainEvent::GroupCreated { group_id, .. }
            | DomainEvent::GroupActivated { group_id, .. }
            | DomainEvent::GroupCancelled { group_id }
            | DomainEvent::GroupCompleted { group_id, .. }
            | DomainEvent::MemberJoined { group_id, .. }
            | DomainEvent::MemberApproved { group_id, .. }
            | DomainEvent::MemberRemoved { group_id, .. }
            | DomainEvent::CycleOpened { group_id, .. }
            | DomainEvent::ContributionRecorded { group_id, .. }
            | DomainEvent::CycleCompleted { group_id, .. }
            | DomainEvent::CycleDelayed { group_id, .. }
            | DomainEvent::PayoutDue { group_id, .. }
            | DomainEvent::RoundCompleted { group_id, .. }
            | DomainEvent::MemberDefaulted { group_id, .. }
            | DomainEvent::DefaultResolved { group_id, .. } => group_id,
        }
    }
}

/// One persisted row of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub group_id: GroupId,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}
