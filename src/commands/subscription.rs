//! Commands for subscription plan management

use chrono::Utc;

use crate::error::LedgerError;
use crate::ledger::types::{SubscriptionEvent, SubscriptionPlan, SubscriptionResponse};
use crate::ledger::LedgerState;

/// Get the stored plan and expiry
pub async fn get_subscription(
    state: &LedgerState,
    account_id: &str,
) -> Result<SubscriptionResponse, LedgerError> {
    state.subscriptions.get(account_id)
}

/// Change the plan by name. Paid plans get a fresh 30-day period.
pub async fn change_subscription(
    state: &LedgerState,
    account_id: &str,
    plan: &str,
) -> Result<SubscriptionResponse, LedgerError> {
    let plan = SubscriptionPlan::parse(plan)
        .ok_or_else(|| LedgerError::InvalidPlan(plan.to_string()))?;
    let account = state.subscriptions.change_plan(account_id, plan, Utc::now())?;
    Ok(SubscriptionResponse {
        plan: account.subscription_plan,
        valid_until: account.subscription_valid_until,
    })
}

/// Cancel immediately, reverting to the free plan
pub async fn cancel_subscription(
    state: &LedgerState,
    account_id: &str,
) -> Result<SubscriptionResponse, LedgerError> {
    let account = state.subscriptions.cancel(account_id)?;
    Ok(SubscriptionResponse {
        plan: account.subscription_plan,
        valid_until: account.subscription_valid_until,
    })
}

/// Plan change audit trail, most recent first
pub async fn get_subscription_events(
    state: &LedgerState,
    account_id: &str,
) -> Result<Vec<SubscriptionEvent>, LedgerError> {
    state.subscriptions.events(account_id)
}
