//! Domain entities as plain data structures. Relations are explicit
//! queries at the call site — there is no default-scope magic and no
//! implicit eager loading.

use crate::types::{
    ContributionStatus, CustomFrequency, CycleId, CycleStatus, Frequency, GroupId, GroupStatus,
    MemberRole, MemberStatus, MembershipId, PayoutDay, PayoutPolicy, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A savings circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    pub target_member_count: u32,
    /// Per-cycle contribution in minor units of `currency`.
    pub contribution_minor: i64,
    pub currency: String,
    pub payout_day: PayoutDay,
    pub frequency: Frequency,
    pub custom_frequency: Option<CustomFrequency>,
    pub payout_policy: PayoutPolicy,
    pub is_public: bool,
    /// Whether the cycle sequence restarts after one full round.
    pub repeat_rounds: bool,
    pub start_immediately: bool,
    pub status: GroupStatus,
    /// Derived: target minus accepted members. Never negative.
    pub open_slots: u32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user's enrollment in one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub membership_id: MembershipId,
    pub group_id: GroupId,
    pub member_id: UserId,
    pub role: MemberRole,
    pub status: MemberStatus,
    /// 1-indexed payout position; None until assigned (random policy
    /// assigns at activation, not at join).
    pub payout_order: Option<u32>,
    pub member_since: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

/// One payout round within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionCycle {
    pub cycle_id: CycleId,
    pub group_id: GroupId,
    pub cycle_number: u32,
    pub status: CycleStatus,
    pub recipient_id: UserId,
    pub scheduled_date: DateTime<Utc>,
    /// Past this instant an unsettled cycle becomes delayed.
    pub deadline: DateTime<Utc>,
    pub payout_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One member's payment obligation for one cycle. Audit record —
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContribution {
    pub contribution_id: String,
    pub cycle_id: CycleId,
    pub group_id: GroupId,
    pub contributor_id: UserId,
    pub amount_minor: i64,
    pub currency: String,
    pub status: ContributionStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A flag raised against a member for failing an obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDefaultRecord {
    pub default_id: String,
    pub user_id: UserId,
    pub reporter_id: UserId,
    pub group_id: GroupId,
    pub cycle_id: CycleId,
    pub reason: crate::types::DefaultReason,
    pub resolved: bool,
    pub reported_at: DateTime<Utc>,
}

/// Read-only settlement aggregate for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub paid_count: u32,
    pub total_count: u32,
}

impl SettlementSummary {
    pub fn all_paid(&self) -> bool {
        self.total_count > 0 && self.paid_count == self.total_count
    }
}
