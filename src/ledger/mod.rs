//! Token ledger core
//!
//! This module handles:
//! - Account balances with an append-only audit trail
//! - The reserve/commit-or-refund protocol around paid feature actions
//! - Cost policy and subscription-tier eligibility
//! - Bounded daily reward grants

pub mod policy;
pub mod reservation;
pub mod reward;
pub mod store;
pub mod subscription;
pub mod types;

pub use policy::FeatureAction;
pub use reservation::ReservationLedger;
pub use reward::DailyReward;
pub use store::LedgerStore;
pub use subscription::SubscriptionService;
pub use types::{
    Account, BalanceResponse, EntryKind, LedgerEntry, RewardResponse, SubscriptionEvent,
    SubscriptionPlan, SubscriptionResponse,
};

use std::path::Path;
use std::sync::Arc;

use crate::error::LedgerError;

/// Ledger state held by the host application for the process lifetime and
/// injected into every command handler.
pub struct LedgerState {
    pub store: Arc<LedgerStore>,
    pub reservations: ReservationLedger,
    pub subscriptions: SubscriptionService,
    pub rewards: DailyReward,
}

impl LedgerState {
    fn from_store(store: LedgerStore) -> Self {
        let store = Arc::new(store);
        Self {
            reservations: ReservationLedger::new(store.clone()),
            subscriptions: SubscriptionService::new(store.clone()),
            rewards: DailyReward::new(store.clone()),
            store,
        }
    }

    /// Open the default on-disk ledger under the user config directory
    pub fn new() -> Result<Self, LedgerError> {
        Ok(Self::from_store(LedgerStore::new()?))
    }

    /// Open a ledger at an explicit path
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        Ok(Self::from_store(LedgerStore::open(path)?))
    }

    /// In-memory ledger for tests and ephemeral hosts
    pub fn in_memory() -> Result<Self, LedgerError> {
        Ok(Self::from_store(LedgerStore::in_memory()?))
    }
}
