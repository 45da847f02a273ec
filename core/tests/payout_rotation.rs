//! Payout rotation tests: the anti-fraud admin-last rule, the random
//! permutation dealt at activation, and recipient lookup by cycle
//! number.

use circle_core::{
    config::CoreConfig,
    group_service::{CreateGroupParams, GroupService},
    identity::UserProfile,
    membership_service::MembershipService,
    rng::OrderRng,
    store::CircleStore,
    types::{Frequency, GroupStatus, MemberRole, PayoutDay, PayoutPolicy},
};
use std::collections::BTreeSet;

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

fn build_full_group(store: &CircleStore, config: &CoreConfig, target: u32) -> String {
    let groups = GroupService::new(store, config);
    let members = MembershipService::new(store, config);
    let (group, _) = groups
        .create_group(
            &CreateGroupParams {
                name: format!("rotation-{target}"),
                description: "Rotation order test circle.".to_string(),
                target_member_count: target,
                contribution_minor: 5_000,
                payout_day: PayoutDay::Friday,
                frequency: Frequency::Weekly,
                custom_frequency: None,
                payout_policy: PayoutPolicy::Random,
                is_public: false,
                repeat_rounds: false,
                start_immediately: false,
                default_currency: None,
            },
            &admin(),
        )
        .unwrap();
    for i in 1..target {
        members.add_member(&group.group_id, &format!("u{i}")).unwrap();
    }
    group.group_id
}

#[test]
fn random_activation_deals_a_full_permutation_with_admin_last() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);
    let group_id = build_full_group(&store, &config, 6);

    // No orders before activation except the admin's reserved slot.
    for m in members.list_members(&group_id, None, None, None).unwrap() {
        if m.role == MemberRole::Admin {
            assert_eq!(m.payout_order, Some(6));
        } else {
            assert_eq!(m.payout_order, None);
        }
    }

    let mut rng = OrderRng::seed_from(99);
    let group = groups.activate_group(&group_id, &mut rng).unwrap();
    assert_eq!(group.status, GroupStatus::Active);

    let mut seen = BTreeSet::new();
    for m in members.list_members(&group_id, None, None, None).unwrap() {
        let order = m.payout_order.expect("every member has a slot now");
        assert!(seen.insert(order), "slot {order} dealt twice");
        if m.role == MemberRole::Admin {
            assert_eq!(order, 6, "admin must stay in the last slot");
        } else {
            assert!((1..=5).contains(&order));
        }
    }
    assert_eq!(seen.len(), 6);
}

#[test]
fn the_same_seed_deals_the_same_permutation() {
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };

    let orders = |seed: u64| -> Vec<(String, Option<u32>)> {
        let store = store();
        let groups = GroupService::new(&store, &config);
        let members = MembershipService::new(&store, &config);
        let group_id = build_full_group(&store, &config, 5);
        let mut rng = OrderRng::seed_from(seed);
        groups.activate_group(&group_id, &mut rng).unwrap();
        let mut all: Vec<_> = members
            .list_members(&group_id, None, None, None)
            .unwrap()
            .into_iter()
            .map(|m| (m.member_id, m.payout_order))
            .collect();
        all.sort();
        all
    };

    assert_eq!(orders(42), orders(42));
}

#[test]
fn recipient_follows_the_slot_for_the_cycle_number() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let group_id = build_full_group(&store, &config, 4);
    let mut rng = OrderRng::seed_from(3);
    let group = groups.activate_group(&group_id, &mut rng).unwrap();

    for cycle_number in 1..=8u32 {
        let slot = (cycle_number - 1) % 4 + 1;
        let expected = store
            .membership_by_order(&group_id, slot)
            .unwrap()
            .expect("slot is occupied");
        let recipient =
            circle_core::payout_order::next_recipient(&store, &group, cycle_number).unwrap();
        assert_eq!(
            recipient.member_id, expected.member_id,
            "cycle {cycle_number} maps to slot {slot}"
        );
    }
}

#[test]
fn activation_with_open_slots_needs_start_immediately() {
    let store = store();
    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);

    let mut params = CreateGroupParams {
        name: "short-handed".to_string(),
        description: "Starts before it fills up.".to_string(),
        target_member_count: 5,
        contribution_minor: 5_000,
        payout_day: PayoutDay::Friday,
        frequency: Frequency::Weekly,
        custom_frequency: None,
        payout_policy: PayoutPolicy::FirstComeFirstServe,
        is_public: false,
        repeat_rounds: false,
        start_immediately: false,
        default_currency: None,
    };
    let (group, _) = groups.create_group(&params, &admin()).unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();

    let mut rng = OrderRng::seed_from(1);
    assert!(matches!(
        groups.activate_group(&group.group_id, &mut rng).unwrap_err(),
        circle_core::error::CoreError::Precondition(_)
    ));

    params.name = "short-handed-but-eager".to_string();
    params.start_immediately = true;
    let (eager, _) = groups.create_group(&params, &admin()).unwrap();
    members.add_member(&eager.group_id, &"u1".to_string()).unwrap();
    let activated = groups.activate_group(&eager.group_id, &mut rng).unwrap();
    assert_eq!(activated.status, GroupStatus::Active);
}
