//! Membership ledger tests: joins, capacity, approval, removal, and
//! the payout slot assignment rules.

use circle_core::{
    config::CoreConfig,
    error::CoreError,
    group_service::{CreateGroupParams, GroupService},
    identity::UserProfile,
    membership_service::MembershipService,
    rng::OrderRng,
    store::CircleStore,
    types::{Frequency, MemberRole, MemberStatus, PayoutDay, PayoutPolicy},
};

fn store() -> CircleStore {
    let store = CircleStore::in_memory().expect("in-memory store");
    store.migrate().expect("migrations");
    store
}

fn admin() -> UserProfile {
    UserProfile {
        id: "admin".to_string(),
        has_verified_phone: true,
        default_payout_currency: Some("NGN".to_string()),
    }
}

fn params(target: u32, policy: PayoutPolicy) -> CreateGroupParams {
    CreateGroupParams {
        name: format!("circle-of-{target}"),
        description: "Weekly savings circle for friends.".to_string(),
        target_member_count: target,
        contribution_minor: 5_000,
        payout_day: PayoutDay::Friday,
        frequency: Frequency::Weekly,
        custom_frequency: None,
        payout_policy: policy,
        is_public: false,
        repeat_rounds: false,
        start_immediately: false,
        default_currency: None,
    }
}

#[test]
fn fcfs_joins_take_the_lowest_free_slot_and_admin_keeps_the_last() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, admin_membership) = groups
        .create_group(&params(4, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    assert_eq!(admin_membership.payout_order, Some(4));

    let m1 = members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    let m2 = members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    let m3 = members.add_member(&group.group_id, &"u3".to_string()).unwrap();
    assert_eq!(m1.payout_order, Some(1));
    assert_eq!(m2.payout_order, Some(2));
    assert_eq!(m3.payout_order, Some(3));
    assert_eq!(groups.open_slots(&group.group_id).unwrap(), 0);
}

#[test]
fn joining_twice_is_a_conflict() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(4, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    let err = members
        .add_member(&group.group_id, &"u1".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");
}

#[test]
fn the_final_slot_goes_to_exactly_one_joiner() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    members.add_member(&group.group_id, &"u2".to_string()).unwrap();

    let err = members
        .add_member(&group.group_id, &"u3".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::Capacity(_)), "got {err:?}");
}

#[test]
fn pending_joins_hold_a_slot_until_reviewed() {
    let store = store();
    // Default config: joins wait for admin approval.
    let config = CoreConfig::default();
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();

    let joined = members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    assert_eq!(joined.status, MemberStatus::Pending);
    assert_eq!(joined.payout_order, None, "no slot before approval");
    assert_eq!(
        groups.open_slots(&group.group_id).unwrap(),
        1,
        "a pending join still reserves its slot"
    );

    let approved = members
        .approve_member(&group.group_id, &"u1".to_string())
        .unwrap();
    assert_eq!(approved.status, MemberStatus::Active);
    assert_eq!(approved.payout_order, Some(1));

    // Approving twice is an error.
    assert!(matches!(
        members
            .approve_member(&group.group_id, &"u1".to_string())
            .unwrap_err(),
        CoreError::InvalidState(_)
    ));
}

#[test]
fn removal_frees_the_slot_and_the_admin_is_untouchable() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    assert_eq!(groups.open_slots(&group.group_id).unwrap(), 1);

    members.remove_member(&group.group_id, &"u1".to_string()).unwrap();
    assert_eq!(groups.open_slots(&group.group_id).unwrap(), 2);
    // No cycle ever referenced u1, so the row is gone entirely.
    assert!(store.membership(&group.group_id, &"u1".to_string()).unwrap().is_none());

    // A freed slot is handed out again.
    let m = members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    assert_eq!(m.payout_order, Some(1));

    assert!(matches!(
        members
            .remove_member(&group.group_id, &"admin".to_string())
            .unwrap_err(),
        CoreError::InvalidState(_)
    ));
}

#[test]
fn members_with_cycle_history_are_only_soft_removed() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);
    let engine = circle_core::cycle_engine::CycleEngine::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    let mut rng = OrderRng::seed_from(7);
    groups.activate_group(&group.group_id, &mut rng).unwrap();
    engine.open_cycle(&group.group_id, chrono::Utc::now()).unwrap();

    members.remove_member(&group.group_id, &"u1".to_string()).unwrap();
    let kept = store
        .membership(&group.group_id, &"u1".to_string())
        .unwrap()
        .expect("soft-removed row survives");
    assert!(kept.removed_at.is_some());
}

#[test]
fn no_joins_after_activation() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    let mut rng = OrderRng::seed_from(7);
    groups.activate_group(&group.group_id, &mut rng).unwrap();

    assert!(matches!(
        members
            .add_member(&group.group_id, &"late".to_string())
            .unwrap_err(),
        CoreError::InvalidState(_)
    ));
}

#[test]
fn no_approvals_after_activation() {
    let store = store();
    // Manual approval: joins wait in pending.
    let config = CoreConfig::default();
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(3, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    members.approve_member(&group.group_id, &"u1".to_string()).unwrap();

    let mut rng = OrderRng::seed_from(2);
    groups.activate_group(&group.group_id, &mut rng).unwrap();

    // The rotation froze at activation; u2 missed the window and can
    // never end up contributing without a payout slot.
    let err = members
        .approve_member(&group.group_id, &"u2".to_string())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)), "got {err:?}");
}

#[test]
fn list_members_filters_by_role_and_status() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let (group, _) = groups
        .create_group(&params(4, PayoutPolicy::FirstComeFirstServe), &admin())
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    members.add_member(&group.group_id, &"u2".to_string()).unwrap();
    members.suspend_member(&group.group_id, &"u1".to_string()).unwrap();

    let admins = members
        .list_members(&group.group_id, Some(MemberRole::Admin), None, None)
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].member_id, "admin");

    let suspended = members
        .list_members(&group.group_id, None, Some(MemberStatus::Suspended), None)
        .unwrap();
    assert_eq!(suspended.len(), 1);
    assert_eq!(suspended[0].member_id, "u1");

    let everyone = members
        .list_members(&group.group_id, None, None, None)
        .unwrap();
    assert_eq!(everyone.len(), 3);
}
