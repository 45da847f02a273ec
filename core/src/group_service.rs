//! The group aggregate: configuration, status state machine, and the
//! atomic create-group-with-admin-membership operation.

use crate::config::{CoreConfig, Page};
use crate::error::{CoreError, CoreResult};
use crate::event::DomainEvent;
use crate::identity::UserProfile;
use crate::model::{Group, Membership};
use crate::payout_order;
use crate::rng::OrderRng;
use crate::store::CircleStore;
use crate::types::{
    new_id, CustomFrequency, Frequency, GroupId, GroupStatus, MemberRole, MemberStatus,
    PayoutDay, PayoutPolicy, UserId,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

pub const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=60;
pub const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 10..=200;
pub const TARGET_MEMBERS: std::ops::RangeInclusive<u32> = 3..=100;
pub const CUSTOM_STEP: std::ops::RangeInclusive<u32> = 2..=10;
const SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub name: String,
    pub description: String,
    pub target_member_count: u32,
    pub contribution_minor: i64,
    pub payout_day: PayoutDay,
    pub frequency: Frequency,
    pub custom_frequency: Option<CustomFrequency>,
    pub payout_policy: PayoutPolicy,
    pub is_public: bool,
    pub repeat_rounds: bool,
    pub start_immediately: bool,
    /// Group-level currency override; falls back to the creator's
    /// default payout currency.
    pub default_currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroupParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    /// Only changeable while the group is still pending.
    pub contribution_minor: Option<i64>,
}

pub struct GroupService<'a> {
    store: &'a CircleStore,
    config: &'a CoreConfig,
}

impl<'a> GroupService<'a> {
    pub fn new(store: &'a CircleStore, config: &'a CoreConfig) -> Self {
        Self { store, config }
    }

    /// Create a group and enroll the creator as its admin member in a
    /// single transaction. The admin takes the LAST payout slot.
    pub fn create_group(
        &self,
        params: &CreateGroupParams,
        creator: &UserProfile,
    ) -> CoreResult<(Group, Membership)> {
        validate_params(params)?;

        if !creator.has_verified_phone {
            return Err(CoreError::Precondition(format!(
                "user {} has no verified phone number",
                creator.id
            )));
        }
        let currency = params
            .default_currency
            .clone()
            .or_else(|| creator.default_payout_currency.clone())
            .ok_or_else(|| {
                CoreError::Precondition(
                    "set up a default payout account or provide a currency for this group"
                        .to_string(),
                )
            })?;

        let now = Utc::now();
        let group = Group {
            group_id: new_id(),
            name: params.name.trim().to_string(),
            description: params.description.trim().to_string(),
            owner_id: creator.id.clone(),
            target_member_count: params.target_member_count,
            contribution_minor: params.contribution_minor,
            currency,
            payout_day: params.payout_day,
            frequency: params.frequency,
            custom_frequency: params.custom_frequency,
            payout_policy: params.payout_policy,
            is_public: params.is_public,
            repeat_rounds: params.repeat_rounds,
            start_immediately: params.start_immediately,
            status: GroupStatus::Pending,
            open_slots: params.target_member_count - 1,
            created_at: now,
            deleted_at: None,
        };
        let membership = Membership {
            membership_id: new_id(),
            group_id: group.group_id.clone(),
            member_id: creator.id.clone(),
            role: MemberRole::Admin,
            status: MemberStatus::Active,
            payout_order: Some(group.target_member_count),
            member_since: now,
            removed_at: None,
        };

        self.store.with_tx(|store| {
            store.insert_group(&group).map_err(|err| {
                if err.is_unique_violation() {
                    CoreError::Conflict(format!("group name '{}' is already taken", group.name))
                } else {
                    err
                }
            })?;
            store.insert_membership(&membership)?;
            store.append_event(
                &DomainEvent::GroupCreated {
                    group_id: group.group_id.clone(),
                    owner_id: creator.id.clone(),
                    name: group.name.clone(),
                },
                now,
            )?;
            Ok(())
        })?;

        info!(
            "created group {} '{}' (target {}, {} {})",
            group.group_id,
            group.name,
            group.target_member_count,
            group.contribution_minor,
            group.currency
        );
        Ok((group, membership))
    }

    /// Transition pending → active. Requires a full group unless it
    /// was configured to start immediately. Random-policy groups get
    /// their payout permutation dealt here.
    pub fn activate_group(&self, group_id: &GroupId, rng: &mut OrderRng) -> CoreResult<Group> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if !group.status.can_transition_to(GroupStatus::Active) {
                return Err(CoreError::InvalidState(format!(
                    "group {group_id} is {} and cannot activate",
                    group.status.as_str()
                )));
            }
            let open_slots = crate::membership_service::recompute_open_slots(store, &group)?;
            if open_slots > 0 && !group.start_immediately {
                return Err(CoreError::Precondition(format!(
                    "group {group_id} still has {open_slots} open slots"
                )));
            }

            if group.payout_policy == PayoutPolicy::Random {
                payout_order::shuffle_orders(store, &group, rng)?;
            }
            // Short-handed activation leaves unoccupied slots behind;
            // renumber so the rotation is exactly 1..=member_count.
            payout_order::compact_orders(store, &group)?;
            store.set_group_status(group_id, GroupStatus::Active)?;
            let member_count = store.active_member_count(group_id)?;
            store.append_event(
                &DomainEvent::GroupActivated {
                    group_id: group_id.clone(),
                    member_count,
                },
                Utc::now(),
            )?;
            info!("activated group {group_id} with {member_count} members");
            store.get_group(group_id)
        })
    }

    pub fn update_group(
        &self,
        group_id: &GroupId,
        caller: &UserId,
        params: &UpdateGroupParams,
    ) -> CoreResult<Group> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if &group.owner_id != caller {
                return Err(CoreError::Precondition(format!(
                    "only the owner may update group {group_id}"
                )));
            }
            if group.status != GroupStatus::Pending && params.contribution_minor.is_some() {
                return Err(CoreError::InvalidState(format!(
                    "contribution amount of group {group_id} is frozen once the group starts"
                )));
            }
            if matches!(group.status, GroupStatus::Completed | GroupStatus::Cancelled) {
                return Err(CoreError::InvalidState(format!(
                    "group {group_id} is {} and cannot be updated",
                    group.status.as_str()
                )));
            }

            let name = params.name.clone().unwrap_or_else(|| group.name.clone());
            let description = params
                .description
                .clone()
                .unwrap_or_else(|| group.description.clone());
            let contribution = params.contribution_minor.unwrap_or(group.contribution_minor);
            validate_name(&name)?;
            validate_description(&description)?;
            validate_amount(contribution)?;

            store
                .update_group_profile(
                    group_id,
                    name.trim(),
                    description.trim(),
                    params.is_public.unwrap_or(group.is_public),
                    contribution,
                )
                .map_err(|err| {
                    if err.is_unique_violation() {
                        CoreError::Conflict(format!("group name '{name}' is already taken"))
                    } else {
                        err
                    }
                })?;
            store.get_group(group_id)
        })
    }

    pub fn cancel_group(&self, group_id: &GroupId, caller: &UserId) -> CoreResult<Group> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if &group.owner_id != caller {
                return Err(CoreError::Precondition(format!(
                    "only the owner may cancel group {group_id}"
                )));
            }
            if !group.status.can_transition_to(GroupStatus::Cancelled) {
                return Err(CoreError::InvalidState(format!(
                    "group {group_id} is {} and cannot be cancelled",
                    group.status.as_str()
                )));
            }
            store.set_group_status(group_id, GroupStatus::Cancelled)?;
            store.append_event(
                &DomainEvent::GroupCancelled {
                    group_id: group_id.clone(),
                },
                Utc::now(),
            )?;
            info!("cancelled group {group_id}");
            store.get_group(group_id)
        })
    }

    /// Owner-initiated soft delete. Cycle and contribution history is
    /// audit data and stays behind.
    pub fn delete_group(&self, group_id: &GroupId, caller: &UserId) -> CoreResult<()> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if &group.owner_id != caller {
                return Err(CoreError::Precondition(format!(
                    "only the owner may delete group {group_id}"
                )));
            }
            store.soft_delete_group(group_id, Utc::now())
        })
    }

    pub fn find_group(&self, group_id: &GroupId) -> CoreResult<Group> {
        self.store.get_group(group_id)
    }

    pub fn search_public_groups(&self, name_fragment: &str) -> CoreResult<Vec<Group>> {
        self.store.search_public_groups(name_fragment, SEARCH_LIMIT)
    }

    /// Groups the user belongs to, newest membership first.
    pub fn list_user_groups(
        &self,
        user_id: &UserId,
        role: Option<MemberRole>,
        page: Option<Page>,
    ) -> CoreResult<Vec<(Membership, Group)>> {
        let page = page.unwrap_or_else(|| Page::first(self.config));
        self.store.list_user_groups(user_id, role, page)
    }

    pub fn open_slots(&self, group_id: &GroupId) -> CoreResult<u32> {
        let group = self.store.get_group(group_id)?;
        Ok(group.open_slots)
    }
}

fn validate_params(params: &CreateGroupParams) -> CoreResult<()> {
    validate_name(&params.name)?;
    validate_description(&params.description)?;
    validate_amount(params.contribution_minor)?;
    if !TARGET_MEMBERS.contains(&params.target_member_count) {
        return Err(CoreError::Validation(format!(
            "target member count must be between {} and {}",
            TARGET_MEMBERS.start(),
            TARGET_MEMBERS.end()
        )));
    }
    match (params.frequency, params.custom_frequency) {
        (Frequency::Custom, None) => {
            return Err(CoreError::Validation(
                "custom frequency requires step and unit".to_string(),
            ))
        }
        (Frequency::Custom, Some(custom)) if !CUSTOM_STEP.contains(&custom.step) => {
            return Err(CoreError::Validation(format!(
                "custom frequency step must be between {} and {}",
                CUSTOM_STEP.start(),
                CUSTOM_STEP.end()
            )))
        }
        _ => {}
    }
    Ok(())
}

fn validate_name(name: &str) -> CoreResult<()> {
    let len = name.trim().chars().count();
    if !NAME_LEN.contains(&len) {
        return Err(CoreError::Validation(format!(
            "group name must be {} to {} characters",
            NAME_LEN.start(),
            NAME_LEN.end()
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> CoreResult<()> {
    let len = description.trim().chars().count();
    if !DESCRIPTION_LEN.contains(&len) {
        return Err(CoreError::Validation(format!(
            "group description must be {} to {} characters",
            DESCRIPTION_LEN.start(),
            DESCRIPTION_LEN.end()
        )));
    }
    Ok(())
}

fn validate_amount(contribution_minor: i64) -> CoreResult<()> {
    if contribution_minor <= 0 {
        return Err(CoreError::Validation(
            "contribution amount must be positive".to_string(),
        ));
    }
    Ok(())
}
