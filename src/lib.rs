//! Token ledger and usage-metering subsystem
//!
//! Holds per-account token balances, meters paid AI-backed feature actions
//! through a reserve/commit-or-refund protocol, grants bounded daily
//! rewards, and tracks subscription plans. The host application supplies
//! authenticated account ids and the AI collaborator; this crate owns the
//! money.

pub mod ai;
pub mod commands;
pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{
    Account, BalanceResponse, DailyReward, EntryKind, FeatureAction, LedgerEntry, LedgerState,
    LedgerStore, ReservationLedger, RewardResponse, SubscriptionEvent, SubscriptionPlan,
    SubscriptionResponse, SubscriptionService,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with a RUST_LOG env filter.
///
/// Hosts that already install their own subscriber should skip this.
/// Default: warn for dependencies, info for this crate.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,tokenledger=info")),
        )
        .init();
}
