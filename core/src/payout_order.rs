//! Payout order assignment.
//!
//! The admin is always pinned to the LAST slot
//! (`target_member_count`), regardless of join order or policy. The
//! admin created the group and controls it; paying them first would
//! let a malicious admin collect the first pot and vanish.
//!
//! Under first-come-first-serve, members take the lowest unused slot
//! at approval time. Under random, slots are dealt from a uniformly
//! shuffled permutation at group activation, not at join time.
//!
//! All functions here expect to run inside the caller's transaction.

use crate::error::{CoreError, CoreResult};
use crate::model::{Group, Membership};
use crate::rng::OrderRng;
use crate::store::CircleStore;
use crate::types::MemberRole;
use log::{debug, warn};

/// Assign a first-come-first-serve slot to `membership`. Retries once
/// on a unique-index conflict: a concurrent join taking the same slot
/// is an expected race, not a client error.
pub fn assign_order(
    store: &CircleStore,
    group: &Group,
    membership: &Membership,
) -> CoreResult<u32> {
    if membership.role == MemberRole::Admin {
        store.set_payout_order(&membership.membership_id, group.target_member_count)?;
        return Ok(group.target_member_count);
    }

    match try_assign_next_free(store, group, membership) {
        Ok(order) => Ok(order),
        Err(err) if err.is_unique_violation() => {
            warn!(
                "payout order conflict in group {}, retrying once",
                group.group_id
            );
            try_assign_next_free(store, group, membership).map_err(|retry_err| {
                if retry_err.is_unique_violation() {
                    CoreError::Conflict(format!(
                        "payout order contention in group {}",
                        group.group_id
                    ))
                } else {
                    retry_err
                }
            })
        }
        Err(err) => Err(err),
    }
}

fn try_assign_next_free(
    store: &CircleStore,
    group: &Group,
    membership: &Membership,
) -> CoreResult<u32> {
    let next = next_free_slot(store, group)?;
    store.set_payout_order(&membership.membership_id, next)?;
    debug!(
        "assigned payout order {next} to {} in group {}",
        membership.member_id, group.group_id
    );
    Ok(next)
}

/// Lowest unused slot in 1..target (the admin owns the target slot).
fn next_free_slot(store: &CircleStore, group: &Group) -> CoreResult<u32> {
    let taken = store.taken_orders(&group.group_id)?;
    let next = (1..group.target_member_count)
        .find(|slot| !taken.contains(slot))
        .ok_or_else(|| {
            CoreError::Capacity(format!(
                "no free payout slots left in group {}",
                group.group_id
            ))
        })?;
    Ok(next)
}

/// Deal the remaining slots to unassigned members as a uniformly
/// shuffled permutation. Called once, at group activation, for the
/// random policy.
pub fn shuffle_orders(store: &CircleStore, group: &Group, rng: &mut OrderRng) -> CoreResult<()> {
    let members = store.unassigned_members(&group.group_id)?;
    if members.is_empty() {
        return Ok(());
    }

    let taken = store.taken_orders(&group.group_id)?;
    let mut free: Vec<u32> = (1..group.target_member_count)
        .filter(|slot| !taken.contains(slot))
        .collect();
    if free.len() < members.len() {
        return Err(CoreError::Conflict(format!(
            "group {} has {} unassigned members but only {} free slots",
            group.group_id,
            members.len(),
            free.len()
        )));
    }

    rng.shuffle(&mut free);
    for (membership, slot) in members.iter().zip(free) {
        store.set_payout_order(&membership.membership_id, slot)?;
    }
    Ok(())
}

/// Renumber the occupied slots to 1..=k, preserving relative order (the
/// admin holds the highest slot and stays last). Runs at activation:
/// a group that activates short-handed would otherwise carry slots
/// nobody holds, and the rotation may never stall on a vacancy.
///
/// Reassignment walks slots ascending, so each member moves to a slot
/// that is already free and the unique index never trips.
pub fn compact_orders(store: &CircleStore, group: &Group) -> CoreResult<()> {
    let holders = store.slot_holders(&group.group_id)?;
    for (index, membership) in holders.iter().enumerate() {
        let slot = index as u32 + 1;
        if membership.payout_order != Some(slot) {
            store.set_payout_order(&membership.membership_id, slot)?;
            debug!(
                "compacted payout order of {} in group {} to {slot}",
                membership.member_id, group.group_id
            );
        }
    }
    Ok(())
}

/// The membership receiving the payout for `cycle_number`. The rotation
/// walks the occupied slots in order: cycle n pays the holder of the
/// ((n − 1) mod k)-th occupied slot, where k is the number of slot
/// holders. For a full group that is slot ((n − 1) mod target) + 1.
pub fn next_recipient(
    store: &CircleStore,
    group: &Group,
    cycle_number: u32,
) -> CoreResult<Membership> {
    let mut holders = store.slot_holders(&group.group_id)?;
    if holders.is_empty() {
        return Err(CoreError::Precondition(format!(
            "no member of group {} holds a payout slot",
            group.group_id
        )));
    }
    let index = (cycle_number as usize - 1) % holders.len();
    Ok(holders.remove(index))
}
