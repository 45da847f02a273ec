//! Cycle engine tests: the full rotation round-trip, payment
//! recording, the at-most-one-pending rule, deadline handling, and
//! repeat-enabled groups.

use chrono::{Duration, Utc};
use circle_core::{
    config::CoreConfig,
    cycle_engine::CycleEngine,
    error::CoreError,
    group_service::{CreateGroupParams, GroupService},
    identity::UserProfile,
    membership_service::MembershipService,
    rng::OrderRng,
    store::CircleStore,
    types::{
        ContributionStatus, CycleStatus, Frequency, GroupStatus, Money, PayoutDay, PayoutPolicy,
    },
};

const CONTRIBUTION: i64 = 10_000;

fn store() -> CircleStore {
    let store = CircleStore::in_memory().expect("in-memory store");
    store.migrate().expect("migrations");
    store
}

fn config() -> CoreConfig {
    CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    }
}

fn admin() -> UserProfile {
    UserProfile {
        id: "admin".to_string(),
        has_verified_phone: true,
        default_payout_currency: Some("NGN".to_string()),
    }
}

/// Creates an FCFS group of `target` members (admin plus u1..) and
/// activates it. Payout order is join order with the admin last.
fn active_group(
    store: &CircleStore,
    config: &CoreConfig,
    target: u32,
    repeat_rounds: bool,
) -> circle_core::model::Group {
    let groups = GroupService::new(store, config);
    let members = MembershipService::new(store, config);
    let (group, _) = groups
        .create_group(
            &CreateGroupParams {
                name: format!("engine-{target}-{repeat_rounds}"),
                description: "Cycle engine test circle.".to_string(),
                target_member_count: target,
                contribution_minor: CONTRIBUTION,
                payout_day: PayoutDay::Friday,
                frequency: Frequency::Weekly,
                custom_frequency: None,
                payout_policy: PayoutPolicy::FirstComeFirstServe,
                is_public: false,
                repeat_rounds,
                start_immediately: false,
                default_currency: None,
            },
            &admin(),
        )
        .unwrap();
    for i in 1..target {
        members.add_member(&group.group_id, &format!("u{i}")).unwrap();
    }
    let mut rng = OrderRng::seed_from(11);
    groups.activate_group(&group.group_id, &mut rng).unwrap()
}

fn pay_everyone(store: &CircleStore, engine: &CycleEngine, cycle_id: &str) {
    for c in store.contributions_for_cycle(&cycle_id.to_string()).unwrap() {
        engine
            .record_payment(
                &cycle_id.to_string(),
                &c.contributor_id,
                &Money::new(CONTRIBUTION, "NGN"),
            )
            .unwrap();
    }
}

#[test]
fn a_full_round_pays_every_member_once_then_completes_the_group() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 5, false);

    let now = Utc::now();
    engine.open_cycle(&group.group_id, now).unwrap();

    let mut recipients = Vec::new();
    while let Some(cycle) = store.pending_cycle(&group.group_id).unwrap() {
        recipients.push(cycle.recipient_id.clone());
        pay_everyone(&store, &engine, &cycle.cycle_id);
        let status = engine.try_close_cycle(&cycle.cycle_id, now).unwrap();
        assert_eq!(status, CycleStatus::Completed);
    }

    // Join order is payout order in an FCFS group, admin last.
    assert_eq!(recipients, vec!["u1", "u2", "u3", "u4", "admin"]);
    assert_eq!(store.completed_cycle_count(&group.group_id).unwrap(), 5);

    let group = store.get_group(&group.group_id).unwrap();
    assert_eq!(group.status, GroupStatus::Completed);
    assert_eq!(store.event_count(&group.group_id, "round_completed").unwrap(), 1);
    assert_eq!(store.event_count(&group.group_id, "group_completed").unwrap(), 1);
    assert_eq!(store.event_count(&group.group_id, "payout_due").unwrap(), 5);
}

#[test]
fn the_recipient_also_owes_into_their_own_pot() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, false);

    let cycle = engine.open_cycle(&group.group_id, Utc::now()).unwrap();
    let contributions = store.contributions_for_cycle(&cycle.cycle_id).unwrap();
    assert_eq!(contributions.len(), 3);
    assert!(contributions
        .iter()
        .any(|c| c.contributor_id == cycle.recipient_id));
}

#[test]
fn only_one_cycle_can_be_open_at_a_time() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, false);

    engine.open_cycle(&group.group_id, Utc::now()).unwrap();
    let err = engine.open_cycle(&group.group_id, Utc::now()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)), "got {err:?}");
}

#[test]
fn cycles_need_an_active_group() {
    let store = store();
    let config = config();
    let groups = GroupService::new(&store, &config);
    let engine = CycleEngine::new(&store, &config);
    let (group, _) = groups
        .create_group(
            &CreateGroupParams {
                name: "not-yet-running".to_string(),
                description: "Still collecting members.".to_string(),
                target_member_count: 3,
                contribution_minor: CONTRIBUTION,
                payout_day: PayoutDay::Friday,
                frequency: Frequency::Weekly,
                custom_frequency: None,
                payout_policy: PayoutPolicy::FirstComeFirstServe,
                is_public: false,
                repeat_rounds: false,
                start_immediately: false,
                default_currency: None,
            },
            &admin(),
        )
        .unwrap();

    let err = engine.open_cycle(&group.group_id, Utc::now()).unwrap_err();
    assert!(matches!(err, CoreError::Precondition(_)), "got {err:?}");
}

#[test]
fn payments_are_validated_against_the_obligation() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, false);
    let cycle = engine.open_cycle(&group.group_id, Utc::now()).unwrap();

    // Unknown contributor.
    assert!(matches!(
        engine
            .record_payment(
                &cycle.cycle_id,
                &"stranger".to_string(),
                &Money::new(CONTRIBUTION, "NGN"),
            )
            .unwrap_err(),
        CoreError::NotFound(_)
    ));

    // Partial payment.
    let err = engine
        .record_payment(
            &cycle.cycle_id,
            &"u1".to_string(),
            &Money::new(CONTRIBUTION - 1, "NGN"),
        )
        .unwrap_err();
    match err {
        CoreError::AmountMismatch { expected, actual } => {
            assert_eq!(expected, CONTRIBUTION);
            assert_eq!(actual, CONTRIBUTION - 1);
        }
        other => panic!("expected amount mismatch, got {other:?}"),
    }

    // Wrong currency.
    assert!(matches!(
        engine
            .record_payment(
                &cycle.cycle_id,
                &"u1".to_string(),
                &Money::new(CONTRIBUTION, "USD"),
            )
            .unwrap_err(),
        CoreError::Validation(_)
    ));

    // Paying twice.
    engine
        .record_payment(&cycle.cycle_id, &"u1".to_string(), &Money::new(CONTRIBUTION, "NGN"))
        .unwrap();
    assert!(matches!(
        engine
            .record_payment(&cycle.cycle_id, &"u1".to_string(), &Money::new(CONTRIBUTION, "NGN"))
            .unwrap_err(),
        CoreError::InvalidState(_)
    ));
}

#[test]
fn a_cycle_past_its_deadline_turns_delayed_and_flags_the_unpaid() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, false);
    let cycle = engine.open_cycle(&group.group_id, Utc::now()).unwrap();

    engine
        .record_payment(&cycle.cycle_id, &"u1".to_string(), &Money::new(CONTRIBUTION, "NGN"))
        .unwrap();

    let long_after = cycle.deadline + Duration::days(1);
    let status = engine.try_close_cycle(&cycle.cycle_id, long_after).unwrap();
    assert_eq!(status, CycleStatus::Delayed);

    let contributions = store.contributions_for_cycle(&cycle.cycle_id).unwrap();
    let defaulted: Vec<_> = contributions
        .iter()
        .filter(|c| c.status == ContributionStatus::Defaulted)
        .map(|c| c.contributor_id.clone())
        .collect();
    assert_eq!(defaulted.len(), 2, "both unpaid members are flagged");
    assert!(!defaulted.contains(&"u1".to_string()));

    let records = store.defaults_for_group(&group.group_id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(store.event_count(&group.group_id, "member_defaulted").unwrap(), 2);
    assert_eq!(store.event_count(&group.group_id, "cycle_delayed").unwrap(), 1);
}

#[test]
fn a_partially_paid_cycle_stays_pending_before_the_deadline() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, false);
    let cycle = engine.open_cycle(&group.group_id, Utc::now()).unwrap();

    engine
        .record_payment(&cycle.cycle_id, &"u1".to_string(), &Money::new(CONTRIBUTION, "NGN"))
        .unwrap();
    let status = engine.try_close_cycle(&cycle.cycle_id, Utc::now()).unwrap();
    assert_eq!(status, CycleStatus::Pending, "partial settlement keeps the cycle open");
}

#[test]
fn repeat_groups_roll_into_the_next_round_with_continued_numbering() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);
    let group = active_group(&store, &config, 3, true);

    let now = Utc::now();
    engine.open_cycle(&group.group_id, now).unwrap();
    for _ in 0..3 {
        let cycle = store.pending_cycle(&group.group_id).unwrap().expect("open cycle");
        pay_everyone(&store, &engine, &cycle.cycle_id);
        engine.try_close_cycle(&cycle.cycle_id, now).unwrap();
    }

    let group = store.get_group(&group.group_id).unwrap();
    assert_eq!(group.status, GroupStatus::Active, "repeat groups keep going");
    let next = store
        .pending_cycle(&group.group_id)
        .unwrap()
        .expect("next round opened automatically");
    assert_eq!(next.cycle_number, 4, "numbering never resets");
    assert_eq!(
        next.recipient_id,
        store
            .membership_by_order(&group.group_id, 1)
            .unwrap()
            .unwrap()
            .member_id,
        "round two starts over from slot one"
    );
    assert_eq!(store.event_count(&group.group_id, "round_completed").unwrap(), 1);
}

#[test]
fn short_handed_groups_rotate_over_occupied_slots_only() {
    let store = store();
    let config = config();
    let groups = GroupService::new(&store, &config);
    let members = MembershipService::new(&store, &config);
    let engine = CycleEngine::new(&store, &config);

    // Five slots but only two members; starts before filling up.
    let (group, _) = groups
        .create_group(
            &CreateGroupParams {
                name: "two-of-five".to_string(),
                description: "Starts with open slots remaining.".to_string(),
                target_member_count: 5,
                contribution_minor: CONTRIBUTION,
                payout_day: PayoutDay::Friday,
                frequency: Frequency::Weekly,
                custom_frequency: None,
                payout_policy: PayoutPolicy::FirstComeFirstServe,
                is_public: false,
                repeat_rounds: false,
                start_immediately: true,
                default_currency: None,
            },
            &admin(),
        )
        .unwrap();
    members.add_member(&group.group_id, &"u1".to_string()).unwrap();
    let mut rng = OrderRng::seed_from(1);
    groups.activate_group(&group.group_id, &mut rng).unwrap();

    // Activation renumbered the slots: u1 first, admin last.
    let slot_two = store
        .membership_by_order(&group.group_id, 2)
        .unwrap()
        .expect("admin was moved into slot two");
    assert_eq!(slot_two.member_id, "admin");

    let now = Utc::now();
    engine.open_cycle(&group.group_id, now).unwrap();
    let mut recipients = Vec::new();
    while let Some(cycle) = store.pending_cycle(&group.group_id).unwrap() {
        recipients.push(cycle.recipient_id.clone());
        pay_everyone(&store, &engine, &cycle.cycle_id);
        let status = engine.try_close_cycle(&cycle.cycle_id, now).unwrap();
        assert_eq!(status, CycleStatus::Completed, "a fully paid cycle must close");
    }

    // One payout per actual member; the vacant slots never stall the
    // rotation or the round boundary.
    assert_eq!(recipients, vec!["u1", "admin"]);
    assert_eq!(
        store.get_group(&group.group_id).unwrap().status,
        GroupStatus::Completed
    );
}

#[test]
fn sweep_closes_every_expired_cycle() {
    let store = store();
    let config = config();
    let engine = CycleEngine::new(&store, &config);

    let group_a = active_group(&store, &config, 3, false);
    let cycle_a = engine.open_cycle(&group_a.group_id, Utc::now()).unwrap();

    let far_future = cycle_a.deadline + Duration::days(30);
    assert_eq!(engine.sweep_expired_cycles(Utc::now()).unwrap(), 0);
    assert_eq!(engine.sweep_expired_cycles(far_future).unwrap(), 1);
    assert_eq!(
        store.get_cycle(&cycle_a.cycle_id).unwrap().status,
        CycleStatus::Delayed
    );
}
