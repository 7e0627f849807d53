//! Subscription plan management
//!
//! The stored plan plus expiry is the source of truth; the plan in force is
//! always derived (`Account::effective_plan`), so an expired premium account
//! behaves as free without any background downgrade job. Every plan change
//! appends to the subscription audit trail.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::store::LedgerStore;
use super::types::{Account, SubscriptionEvent, SubscriptionPlan, SubscriptionResponse};
use crate::error::LedgerError;

/// Paid plan period granted per upgrade/renewal
pub const PLAN_PERIOD_DAYS: i64 = 30;

/// Subscription state service layered on the ledger store
pub struct SubscriptionService {
    store: Arc<LedgerStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Current plan and expiry for an account
    pub fn get(&self, account_id: &str) -> Result<SubscriptionResponse, LedgerError> {
        let account = self.store.get_account(account_id)?;
        Ok(SubscriptionResponse {
            plan: account.subscription_plan,
            valid_until: account.subscription_valid_until,
        })
    }

    /// The plan currently in force for an account
    pub fn effective_plan(&self, account_id: &str, now: DateTime<Utc>) -> Result<SubscriptionPlan, LedgerError> {
        Ok(self.store.get_account(account_id)?.effective_plan(now))
    }

    /// Switch to a plan. Paid plans get a fresh 30-day period from now;
    /// switching to free behaves like `cancel`.
    pub fn change_plan(
        &self,
        account_id: &str,
        plan: SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let valid_until = plan
            .is_paid()
            .then(|| now + Duration::days(PLAN_PERIOD_DAYS));
        let account = self.store.set_subscription(account_id, plan, valid_until)?;

        info!(
            account = account_id,
            plan = plan.as_str(),
            "Subscription changed"
        );
        Ok(account)
    }

    /// Cancel immediately: plan resets to free and the expiry clears now,
    /// not at period end.
    pub fn cancel(&self, account_id: &str) -> Result<Account, LedgerError> {
        let account = self
            .store
            .set_subscription(account_id, SubscriptionPlan::Free, None)?;

        info!(account = account_id, "Subscription canceled");
        Ok(account)
    }

    /// Plan change audit trail, most recent first
    pub fn events(&self, account_id: &str) -> Result<Vec<SubscriptionEvent>, LedgerError> {
        self.store.subscription_events(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_service() -> (SubscriptionService, Arc<LedgerStore>) {
        let store = Arc::new(LedgerStore::in_memory().unwrap());
        store.create_account("acct_1").unwrap();
        (SubscriptionService::new(store.clone()), store)
    }

    #[test]
    fn test_upgrade_sets_thirty_day_period() {
        let (service, _store) = make_service();
        let now = Utc::now();

        let account = service
            .change_plan("acct_1", SubscriptionPlan::Premium, now)
            .unwrap();
        assert_eq!(account.subscription_plan, SubscriptionPlan::Premium);
        assert_eq!(
            account.subscription_valid_until,
            Some(now + Duration::days(PLAN_PERIOD_DAYS))
        );
        assert_eq!(account.effective_plan(now), SubscriptionPlan::Premium);
    }

    #[test]
    fn test_renewal_extends_from_now() {
        let (service, _store) = make_service();
        let now = Utc::now();

        service
            .change_plan("acct_1", SubscriptionPlan::Premium, now)
            .unwrap();
        let later = now + Duration::days(20);
        let account = service
            .change_plan("acct_1", SubscriptionPlan::Premium, later)
            .unwrap();
        assert_eq!(
            account.subscription_valid_until,
            Some(later + Duration::days(PLAN_PERIOD_DAYS))
        );
    }

    #[test]
    fn test_expired_plan_is_effectively_free() {
        let (service, store) = make_service();
        let past = Utc::now() - Duration::days(60);

        service
            .change_plan("acct_1", SubscriptionPlan::Unlimited, past)
            .unwrap();
        let account = store.get_account("acct_1").unwrap();

        // Stored plan survives, effective plan does not
        assert_eq!(account.subscription_plan, SubscriptionPlan::Unlimited);
        assert_eq!(account.effective_plan(Utc::now()), SubscriptionPlan::Free);
    }

    #[test]
    fn test_cancel_is_immediate() {
        let (service, _store) = make_service();
        let now = Utc::now();

        service
            .change_plan("acct_1", SubscriptionPlan::Premium, now)
            .unwrap();
        let account = service.cancel("acct_1").unwrap();

        assert_eq!(account.subscription_plan, SubscriptionPlan::Free);
        assert_eq!(account.subscription_valid_until, None);
    }

    #[test]
    fn test_every_change_is_audited() {
        let (service, _store) = make_service();
        let now = Utc::now();

        service
            .change_plan("acct_1", SubscriptionPlan::Premium, now)
            .unwrap();
        service.cancel("acct_1").unwrap();

        let events = service.events("acct_1").unwrap();
        assert_eq!(events.len(), 2);
        // Most recent first
        assert_eq!(events[0].new_plan, SubscriptionPlan::Free);
        assert_eq!(events[1].new_plan, SubscriptionPlan::Premium);
    }
}
