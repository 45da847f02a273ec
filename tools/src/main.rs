//! circle-runner: headless demo runner for the savings-circle core.
//!
//! Drives one full group round against a SQLite database: creates a
//! group, enrolls members, activates it, then pays every contribution
//! in every cycle until the round completes.
//!
//! Usage:
//!   circle-runner --members 5 --amount 10000 --seed 42 --db circles.db

use anyhow::Result;
use chrono::Utc;
use circle_core::{
    config::CoreConfig,
    cycle_engine::CycleEngine,
    group_service::{CreateGroupParams, GroupService},
    identity::{IdentityProvider, StaticDirectory},
    membership_service::MembershipService,
    rng::OrderRng,
    store::CircleStore,
    types::{CycleStatus, Frequency, Money, PayoutDay, PayoutPolicy},
};
use std::env;

#[derive(serde::Serialize)]
struct RoundSummary {
    group_id: String,
    group_name: String,
    group_status: String,
    cycles_completed: u32,
    recipients: Vec<(u32, String)>,
    events: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let members = parse_arg(&args, "--members", 5u32);
    let amount = parse_arg(&args, "--amount", 10_000i64);
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    let store = if db == ":memory:" {
        CircleStore::in_memory()?
    } else {
        CircleStore::open(db)?
    };
    store.migrate()?;

    let config = CoreConfig {
        auto_accept_members: true,
        ..CoreConfig::default()
    };
    let mut directory = StaticDirectory::new();
    for i in 1..=members {
        directory.insert(circle_core::identity::UserProfile {
            id: format!("user-{i}"),
            has_verified_phone: true,
            default_payout_currency: Some("NGN".to_string()),
        });
    }

    let groups = GroupService::new(&store, &config);
    let memberships = MembershipService::new(&store, &config);
    let engine = CycleEngine::new(&store, &config);

    let creator = directory.resolve_user(&"user-1".to_string())?;
    let (group, _admin) = groups.create_group(
        &CreateGroupParams {
            name: format!("demo-circle-{seed}"),
            description: "A demo rotating-savings circle.".to_string(),
            target_member_count: members,
            contribution_minor: amount,
            payout_day: PayoutDay::Friday,
            frequency: Frequency::Weekly,
            custom_frequency: None,
            payout_policy: PayoutPolicy::Random,
            is_public: true,
            repeat_rounds: false,
            start_immediately: false,
            default_currency: None,
        },
        &creator,
    )?;
    log::info!("created group {} ({})", group.name, group.group_id);

    for i in 2..=members {
        memberships.add_member(&group.group_id, &format!("user-{i}"))?;
    }
    let mut rng = OrderRng::seed_from(seed);
    groups.activate_group(&group.group_id, &mut rng)?;

    // Pay every obligation in every cycle until the round ends.
    let mut recipients = Vec::new();
    engine.open_cycle(&group.group_id, Utc::now())?;
    while let Some(cycle) = store.pending_cycle(&group.group_id)? {
        recipients.push((cycle.cycle_number, cycle.recipient_id.clone()));
        for contribution in store.contributions_for_cycle(&cycle.cycle_id)? {
            engine.record_payment(
                &cycle.cycle_id,
                &contribution.contributor_id,
                &Money::new(contribution.amount_minor, contribution.currency.clone()),
            )?;
        }
        let status = engine.try_close_cycle(&cycle.cycle_id, Utc::now())?;
        if status != CycleStatus::Completed {
            anyhow::bail!(
                "cycle {} did not complete (status {})",
                cycle.cycle_number,
                status.as_str()
            );
        }
    }

    let final_group = groups.find_group(&group.group_id)?;
    let summary = RoundSummary {
        group_id: final_group.group_id.clone(),
        group_name: final_group.name.clone(),
        group_status: final_group.status.as_str().to_string(),
        cycles_completed: store.completed_cycle_count(&group.group_id)?,
        recipients,
        events: store
            .events_for_group(&group.group_id)?
            .into_iter()
            .map(|e| e.event_type)
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
