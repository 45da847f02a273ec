//! circle-core: the contribution lifecycle and payout-ordering engine
//! for rotating-savings groups.
//!
//! A caller (HTTP layer, scheduler — both outside this crate) works
//! with the services: [`group_service::GroupService`] owns group
//! configuration and its status machine,
//! [`membership_service::MembershipService`] owns enrollment and
//! payout slots, [`cycle_engine::CycleEngine`] advances contribution
//! cycles, [`contribution_ledger::ContributionLedger`] tracks payment
//! status, and [`default_tracker::DefaultTracker`] records obligation
//! failures. All state lives in SQLite behind [`store::CircleStore`];
//! every multi-entity write is transactional.

pub mod config;
pub mod contribution_ledger;
pub mod cycle_engine;
pub mod default_tracker;
pub mod error;
pub mod event;
pub mod group_service;
pub mod identity;
pub mod membership_service;
pub mod model;
pub mod payout_order;
pub mod rng;
pub mod schedule;
pub mod store;
pub mod types;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use store::CircleStore;
