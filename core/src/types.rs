//! Shared vocabulary types used across the whole core.
//!
//! Every status field is a closed enum with an `as_str`/`parse` pair for
//! storage round-tripping. An invalid transition is a construction-time
//! error here, never a runtime string typo in a service.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// A stable, unique identifier for any entity. UUID v4, stored as text.
pub type EntityId = String;

pub type UserId = EntityId;
pub type GroupId = EntityId;
pub type MembershipId = EntityId;
pub type CycleId = EntityId;

/// A monetary amount in integer minor units (e.g. kobo, cents) plus an
/// ISO-4217 currency code. Minor units keep cycle arithmetic exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub minor: i64,
    pub currency: String,
}

impl Money {
    pub fn new(minor: i64, currency: impl Into<String>) -> Self {
        Self {
            minor,
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02} {}", self.minor / 100, self.minor % 100, self.currency)
    }
}

fn bad_enum(kind: &str, value: &str) -> CoreError {
    CoreError::Validation(format!("unknown {kind}: '{value}'"))
}

// ── Group ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::Active => "active",
            GroupStatus::Completed => "completed",
            GroupStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "pending" => Ok(GroupStatus::Pending),
            "active" => Ok(GroupStatus::Active),
            "completed" => Ok(GroupStatus::Completed),
            "cancelled" => Ok(GroupStatus::Cancelled),
            other => Err(bad_enum("group status", other)),
        }
    }

    /// Legal transitions: pending → active → completed, and
    /// pending/active → cancelled. Everything else is rejected.
    pub fn can_transition_to(self, next: GroupStatus) -> bool {
        matches!(
            (self, next),
            (GroupStatus::Pending, GroupStatus::Active)
                | (GroupStatus::Active, GroupStatus::Completed)
                | (GroupStatus::Pending, GroupStatus::Cancelled)
                | (GroupStatus::Active, GroupStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayoutPolicy {
    Random,
    FirstComeFirstServe,
}

impl PayoutPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutPolicy::Random => "random",
            PayoutPolicy::FirstComeFirstServe => "first-come-first-serve",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "random" => Ok(PayoutPolicy::Random),
            "first-come-first-serve" => Ok(PayoutPolicy::FirstComeFirstServe),
            other => Err(bad_enum("payout policy", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutDay {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl PayoutDay {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutDay::Sunday => "sunday",
            PayoutDay::Monday => "monday",
            PayoutDay::Tuesday => "tuesday",
            PayoutDay::Wednesday => "wednesday",
            PayoutDay::Thursday => "thursday",
            PayoutDay::Friday => "friday",
            PayoutDay::Saturday => "saturday",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "sunday" => Ok(PayoutDay::Sunday),
            "monday" => Ok(PayoutDay::Monday),
            "tuesday" => Ok(PayoutDay::Tuesday),
            "wednesday" => Ok(PayoutDay::Wednesday),
            "thursday" => Ok(PayoutDay::Thursday),
            "friday" => Ok(PayoutDay::Friday),
            "saturday" => Ok(PayoutDay::Saturday),
            other => Err(bad_enum("payout day", other)),
        }
    }

    pub fn weekday(self) -> chrono::Weekday {
        match self {
            PayoutDay::Sunday => chrono::Weekday::Sun,
            PayoutDay::Monday => chrono::Weekday::Mon,
            PayoutDay::Tuesday => chrono::Weekday::Tue,
            PayoutDay::Wednesday => chrono::Weekday::Wed,
            PayoutDay::Thursday => chrono::Weekday::Thu,
            PayoutDay::Friday => chrono::Weekday::Fri,
            PayoutDay::Saturday => chrono::Weekday::Sat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Custom,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::BiWeekly => "bi-weekly",
            Frequency::Monthly => "monthly",
            Frequency::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "bi-weekly" => Ok(Frequency::BiWeekly),
            "monthly" => Ok(Frequency::Monthly),
            "custom" => Ok(Frequency::Custom),
            other => Err(bad_enum("frequency", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl CustomUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomUnit::Days => "days",
            CustomUnit::Weeks => "weeks",
            CustomUnit::Months => "months",
            CustomUnit::Years => "years",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "days" => Ok(CustomUnit::Days),
            "weeks" => Ok(CustomUnit::Weeks),
            "months" => Ok(CustomUnit::Months),
            "years" => Ok(CustomUnit::Years),
            other => Err(bad_enum("custom frequency unit", other)),
        }
    }
}

/// A user-defined contribution interval, e.g. every 3 weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFrequency {
    pub step: u32,
    pub unit: CustomUnit,
}

// ── Membership ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            other => Err(bad_enum("member role", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Active,
    Suspended,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "pending" => Ok(MemberStatus::Pending),
            "active" => Ok(MemberStatus::Active),
            "suspended" => Ok(MemberStatus::Suspended),
            other => Err(bad_enum("member status", other)),
        }
    }
}

// ── Cycle ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    Completed,
    Delayed,
}

impl CycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Pending => "pending",
            CycleStatus::Completed => "completed",
            CycleStatus::Delayed => "delayed",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "pending" => Ok(CycleStatus::Pending),
            "completed" => Ok(CycleStatus::Completed),
            "delayed" => Ok(CycleStatus::Delayed),
            other => Err(bad_enum("cycle status", other)),
        }
    }
}

// ── Contribution ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    NotPaid,
    NotConfirmed,
    Paid,
    Defaulted,
}

impl ContributionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContributionStatus::NotPaid => "not_paid",
            ContributionStatus::NotConfirmed => "not_confirmed",
            ContributionStatus::Paid => "paid",
            ContributionStatus::Defaulted => "defaulted",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "not_paid" => Ok(ContributionStatus::NotPaid),
            "not_confirmed" => Ok(ContributionStatus::NotConfirmed),
            "paid" => Ok(ContributionStatus::Paid),
            "defaulted" => Ok(ContributionStatus::Defaulted),
            other => Err(bad_enum("contribution status", other)),
        }
    }

    /// Statuses move forward only: not_paid → not_confirmed → paid,
    /// and any state → defaulted. Defaulted is terminal.
    pub fn can_transition_to(self, next: ContributionStatus) -> bool {
        use ContributionStatus::*;
        match (self, next) {
            (NotPaid, NotConfirmed) | (NotPaid, Paid) | (NotConfirmed, Paid) => true,
            (Defaulted, _) => false,
            (_, Defaulted) => true,
            _ => false,
        }
    }
}

// ── Defaults ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    MissedContribution,
    DelayedContribution,
    DisappearedAfterPayout,
}

impl DefaultReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultReason::MissedContribution => "missed_contribution",
            DefaultReason::DelayedContribution => "delayed_contribution",
            DefaultReason::DisappearedAfterPayout => "disappeared_after_payout",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "missed_contribution" => Ok(DefaultReason::MissedContribution),
            "delayed_contribution" => Ok(DefaultReason::DelayedContribution),
            "disappeared_after_payout" => Ok(DefaultReason::DisappearedAfterPayout),
            other => Err(bad_enum("default reason", other)),
        }
    }
}

/// Generate a fresh entity id.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
