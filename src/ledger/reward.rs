//! Daily reward grants
//!
//! A fixed token grant per watched video, capped per local calendar day.
//! The day boundary is the user's local midnight, not a rolling 24h window,
//! and the counter resets lazily on the first claim of a new day rather
//! than via a scheduled job.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::debug;

use super::store::LedgerStore;
use super::types::Account;
use crate::error::LedgerError;

/// Tokens granted per successful claim
pub const REWARD_TOKENS: i64 = 2;

/// Maximum claims per calendar day
pub const DAILY_WATCH_CAP: u32 = 3;

/// Daily reward counter layered on the ledger store
pub struct DailyReward {
    store: Arc<LedgerStore>,
}

impl DailyReward {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Claim today's reward (local calendar day)
    pub fn claim(&self, account_id: &str) -> Result<Account, LedgerError> {
        self.claim_on(account_id, Local::now().date_naive())
    }

    /// Claim the reward for an explicit calendar day
    pub fn claim_on(&self, account_id: &str, day: NaiveDate) -> Result<Account, LedgerError> {
        let account =
            self.store
                .claim_daily_reward(account_id, day, REWARD_TOKENS, DAILY_WATCH_CAP)?;
        debug!(
            account = account_id,
            claims = account.watched_videos_today,
            "Daily reward claimed"
        );
        Ok(account)
    }
}
