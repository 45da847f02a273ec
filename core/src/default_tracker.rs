//! Default tracker: append-only flags against members who fail an
//! obligation. Reports are idempotent on (user, cycle, reason) so a
//! retried call never duplicates a flag.

use crate::error::CoreResult;
use crate::event::DomainEvent;
use crate::model::UserDefaultRecord;
use crate::store::CircleStore;
use crate::types::{new_id, CycleId, DefaultReason, GroupId, UserId};
use chrono::Utc;
use log::info;

pub struct DefaultTracker<'a> {
    store: &'a CircleStore,
}

impl<'a> DefaultTracker<'a> {
    pub fn new(store: &'a CircleStore) -> Self {
        Self { store }
    }

    pub fn report_default(
        &self,
        user_id: &UserId,
        reporter_id: &UserId,
        group_id: &GroupId,
        cycle_id: &CycleId,
        reason: DefaultReason,
    ) -> CoreResult<UserDefaultRecord> {
        self.store.with_tx(|store| {
            report_default_in_tx(store, user_id, reporter_id, group_id, cycle_id, reason)
        })
    }

    /// Resolution consequences are external moderation policy; the
    /// core only stores the flag flip.
    pub fn resolve(&self, default_id: &str) -> CoreResult<UserDefaultRecord> {
        self.store.with_tx(|store| {
            let record = store.get_default(default_id)?;
            store.mark_default_resolved(default_id)?;
            store.append_event(
                &DomainEvent::DefaultResolved {
                    group_id: record.group_id.clone(),
                    member_id: record.user_id.clone(),
                    default_id: default_id.to_string(),
                },
                Utc::now(),
            )?;
            store.get_default(default_id)
        })
    }

    pub fn defaults_for_group(&self, group_id: &GroupId) -> CoreResult<Vec<UserDefaultRecord>> {
        self.store.defaults_for_group(group_id)
    }
}

/// Insert-or-return-existing, for callers already inside a transaction
/// (the cycle engine reports batches when a cycle turns delayed).
pub(crate) fn report_default_in_tx(
    store: &CircleStore,
    user_id: &UserId,
    reporter_id: &UserId,
    group_id: &GroupId,
    cycle_id: &CycleId,
    reason: DefaultReason,
) -> CoreResult<UserDefaultRecord> {
    if let Some(existing) = store.find_default(user_id, cycle_id, reason)? {
        return Ok(existing);
    }

    let record = UserDefaultRecord {
        default_id: new_id(),
        user_id: user_id.clone(),
        reporter_id: reporter_id.clone(),
        group_id: group_id.clone(),
        cycle_id: cycle_id.clone(),
        reason,
        resolved: false,
        reported_at: Utc::now(),
    };
    match store.insert_default(&record) {
        Ok(()) => {}
        // Lost a race against an identical report; the existing row wins.
        Err(err) if err.is_unique_violation() => {
            return store.find_default(user_id, cycle_id, reason)?.ok_or(err);
        }
        Err(err) => return Err(err),
    }

    store.append_event(
        &DomainEvent::MemberDefaulted {
            group_id: group_id.clone(),
            cycle_id: cycle_id.clone(),
            member_id: user_id.clone(),
            reason: reason.as_str().to_string(),
        },
        record.reported_at,
    )?;
    info!(
        "default reported against {user_id} in group {group_id}: {}",
        reason.as_str()
    );
    Ok(record)
}
