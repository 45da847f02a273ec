//! The membership ledger: who belongs to a group, their role, status,
//! and payout slot. Every mutation recomputes the group's cached
//! open-slot count inside the same transaction.

use crate::config::{CoreConfig, Page};
use crate::error::{CoreError, CoreResult};
use crate::event::DomainEvent;
use crate::model::{Group, Membership};
use crate::payout_order;
use crate::store::CircleStore;
use crate::types::{
    new_id, GroupId, GroupStatus, MemberRole, MemberStatus, PayoutPolicy, UserId,
};
use chrono::Utc;
use log::info;

pub struct MembershipService<'a> {
    store: &'a CircleStore,
    config: &'a CoreConfig,
}

impl<'a> MembershipService<'a> {
    pub fn new(store: &'a CircleStore, config: &'a CoreConfig) -> Self {
        Self { store, config }
    }

    /// Enroll a user. Joins are only possible while the group is still
    /// forming; capacity is checked against the occupied slot count
    /// inside the transaction, so concurrent joins for the final slot
    /// cannot both land.
    pub fn add_member(&self, group_id: &GroupId, user_id: &UserId) -> CoreResult<Membership> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if group.status != GroupStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "group {group_id} is {} and no longer accepts members",
                    group.status.as_str()
                )));
            }
            if store.membership(group_id, user_id)?.is_some() {
                return Err(CoreError::Conflict(format!(
                    "user {user_id} is already a member of group {group_id}"
                )));
            }
            let occupied = store.occupied_slot_count(group_id)?;
            if occupied >= group.target_member_count {
                return Err(CoreError::Capacity(format!(
                    "group {group_id} has no open slots"
                )));
            }

            let status = if self.config.auto_accept_members {
                MemberStatus::Active
            } else {
                MemberStatus::Pending
            };
            let now = Utc::now();
            let membership = Membership {
                membership_id: new_id(),
                group_id: group_id.clone(),
                member_id: user_id.clone(),
                role: MemberRole::Member,
                status,
                payout_order: None,
                member_since: now,
                removed_at: None,
            };
            store.insert_membership(&membership).map_err(|err| {
                if err.is_unique_violation() {
                    CoreError::Conflict(format!(
                        "user {user_id} is already a member of group {group_id}"
                    ))
                } else {
                    err
                }
            })?;

            let mut membership = membership;
            if status == MemberStatus::Active {
                membership.payout_order = self.assign_on_accept(store, &group, &membership)?;
            }

            let open_slots = recompute_open_slots(store, &group)?;
            store.append_event(
                &DomainEvent::MemberJoined {
                    group_id: group_id.clone(),
                    member_id: user_id.clone(),
                    open_slots,
                },
                now,
            )?;
            info!("user {user_id} joined group {group_id} ({open_slots} slots left)");
            Ok(membership)
        })
    }

    /// Approve a pending member. FCFS groups hand out the payout slot
    /// here; random groups wait for activation. Activation freezes the
    /// rotation, so approvals are only possible while the group is
    /// still forming.
    pub fn approve_member(&self, group_id: &GroupId, user_id: &UserId) -> CoreResult<Membership> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            if group.status != GroupStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "group {group_id} is {} and joins can no longer be approved",
                    group.status.as_str()
                )));
            }
            let mut membership = store.require_membership(group_id, user_id)?;
            if membership.status != MemberStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "membership of {user_id} in group {group_id} is {}, not pending",
                    membership.status.as_str()
                )));
            }

            store.set_member_status(&membership.membership_id, MemberStatus::Active)?;
            membership.status = MemberStatus::Active;
            membership.payout_order = self.assign_on_accept(store, &group, &membership)?;

            store.append_event(
                &DomainEvent::MemberApproved {
                    group_id: group_id.clone(),
                    member_id: user_id.clone(),
                    payout_order: membership.payout_order,
                },
                Utc::now(),
            )?;
            Ok(membership)
        })
    }

    /// Remove a member. Members already referenced by a cycle are only
    /// soft-removed so cycle history stays intact; the admin is never
    /// removable.
    pub fn remove_member(&self, group_id: &GroupId, user_id: &UserId) -> CoreResult<()> {
        self.store.with_tx(|store| {
            let group = store.get_group(group_id)?;
            let membership = store.require_membership(group_id, user_id)?;
            if membership.role == MemberRole::Admin {
                return Err(CoreError::InvalidState(format!(
                    "the admin of group {group_id} cannot be removed"
                )));
            }

            if store.member_referenced_by_cycles(group_id, user_id)? {
                store.soft_remove_membership(&membership.membership_id, Utc::now())?;
                info!("soft-removed {user_id} from group {group_id} (cycle history kept)");
            } else {
                store.delete_membership(&membership.membership_id)?;
                info!("removed {user_id} from group {group_id}");
            }

            recompute_open_slots(store, &group)?;
            store.append_event(
                &DomainEvent::MemberRemoved {
                    group_id: group_id.clone(),
                    member_id: user_id.clone(),
                },
                Utc::now(),
            )?;
            Ok(())
        })
    }

    pub fn suspend_member(&self, group_id: &GroupId, user_id: &UserId) -> CoreResult<()> {
        self.store.with_tx(|store| {
            let membership = store.require_membership(group_id, user_id)?;
            if membership.role == MemberRole::Admin {
                return Err(CoreError::InvalidState(format!(
                    "the admin of group {group_id} cannot be suspended"
                )));
            }
            if membership.status == MemberStatus::Suspended {
                return Ok(());
            }
            store.set_member_status(&membership.membership_id, MemberStatus::Suspended)
        })
    }

    /// Pure read path: members of a group, newest first.
    pub fn list_members(
        &self,
        group_id: &GroupId,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
        page: Option<Page>,
    ) -> CoreResult<Vec<Membership>> {
        let page = page.unwrap_or_else(|| Page::first(self.config));
        self.store.list_members(group_id, role, status, page)
    }

    pub fn get_membership(&self, group_id: &GroupId, user_id: &UserId) -> CoreResult<Membership> {
        self.store.require_membership(group_id, user_id)
    }

    fn assign_on_accept(
        &self,
        store: &CircleStore,
        group: &Group,
        membership: &Membership,
    ) -> CoreResult<Option<u32>> {
        match group.payout_policy {
            PayoutPolicy::FirstComeFirstServe => {
                payout_order::assign_order(store, group, membership).map(Some)
            }
            // Random policy deals slots at activation; until then the
            // membership carries no order.
            PayoutPolicy::Random => Ok(None),
        }
    }
}

pub(crate) fn recompute_open_slots(store: &CircleStore, group: &Group) -> CoreResult<u32> {
    let occupied = store.occupied_slot_count(&group.group_id)?;
    let open = group.target_member_count.saturating_sub(occupied);
    store.set_open_slots(&group.group_id, open)?;
    Ok(open)
}
