//! Reservation ledger: reserve, act, commit or refund
//!
//! Runs a paid feature action end to end. The cost is debited strictly
//! before the external call (the debit IS the reservation), so two
//! concurrent requests from the same account cannot both pass a balance
//! check and then overspend. A failed call triggers a compensating refund
//! entry; a successful one commits implicitly with no further ledger
//! action. Every reservation reaches a terminal state before `execute`
//! returns, and a cancelled call (the future dropped mid side effect)
//! refunds its hold on drop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use super::policy::{self, FeatureAction};
use super::store::LedgerStore;
use super::types::{EntryKind, SubscriptionPlan};
use crate::error::LedgerError;

/// Refund attempts before declaring a reconciliation defect
const REFUND_RETRY_ATTEMPTS: u32 = 3;

/// Backoff between refund attempts
const REFUND_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Transient hold on tokens between debit and commit/refund
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationStatus {
    Held,
    Committed,
    Refunded,
}

struct Reservation {
    store: Arc<LedgerStore>,
    account_id: String,
    action: FeatureAction,
    cost: i64,
    status: ReservationStatus,
}

impl Reservation {
    fn hold(store: Arc<LedgerStore>, account_id: &str, action: FeatureAction, cost: i64) -> Self {
        Self {
            store,
            account_id: account_id.to_string(),
            action,
            cost,
            status: ReservationStatus::Held,
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.status != ReservationStatus::Held {
            return;
        }
        // The caller cancelled by dropping the execute future during the
        // side-effect await. The store call is synchronous, so the
        // compensating refund is applied right here rather than leaving
        // the hold stranded.
        match self.store.apply_delta(
            &self.account_id,
            self.cost,
            EntryKind::Refund,
            self.action.as_str(),
        ) {
            Ok(_) => {
                self.status = ReservationStatus::Refunded;
                warn!(
                    account = self.account_id,
                    cost = self.cost,
                    action = self.action.as_str(),
                    "Refunded reservation cancelled mid-flight"
                );
            }
            Err(e) => {
                error!(
                    account = self.account_id,
                    cost = self.cost,
                    error = %e,
                    "Reservation dropped while still held and refund failed"
                );
            }
        }
    }
}

/// Orchestrator for paid feature actions
pub struct ReservationLedger {
    store: Arc<LedgerStore>,
}

impl ReservationLedger {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Run a paid action with the action's own plan requirement
    pub async fn execute<T, F, Fut>(
        &self,
        account_id: &str,
        action: FeatureAction,
        side_effect: F,
    ) -> Result<T, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        self.execute_requiring(account_id, action, action.min_plan(), side_effect)
            .await
    }

    /// Run a paid action with an explicit plan requirement (used by
    /// tier-only feature gates layered on a base action).
    ///
    /// Protocol: check eligibility, reserve the cost, await the side
    /// effect, then commit (keep the debit) or refund (compensating entry).
    pub async fn execute_requiring<T, F, Fut>(
        &self,
        account_id: &str,
        action: FeatureAction,
        required: SubscriptionPlan,
        side_effect: F,
    ) -> Result<T, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let account = self.store.get_account(account_id)?;

        // Eligibility is checked once, before the reservation
        let plan = account.effective_plan(Utc::now());
        if !policy::eligible(plan, required) {
            return Err(LedgerError::FeatureNotAvailable {
                action: action.to_string(),
                required,
            });
        }

        // Reserve: debit before the external call. InsufficientTokens
        // aborts here and the side effect is never invoked.
        let cost = action.cost();
        self.store
            .apply_delta(account_id, -cost, EntryKind::Use, action.as_str())?;
        let mut reservation = Reservation::hold(self.store.clone(), account_id, action, cost);

        debug!(
            account = account_id,
            action = action.as_str(),
            cost,
            "Reserved tokens"
        );

        // The only long-latency suspension point: tokens stay held for
        // exactly the duration of this call.
        match side_effect().await {
            Ok(value) => {
                reservation.status = ReservationStatus::Committed;
                debug!(account = account_id, action = action.as_str(), "Committed reservation");
                Ok(value)
            }
            Err(cause) => {
                warn!(
                    account = account_id,
                    action = action.as_str(),
                    error = %cause,
                    "Feature call failed, refunding reservation"
                );
                match self.refund(&mut reservation).await {
                    Ok(()) => Err(LedgerError::SideEffectFailed(cause)),
                    // The defect supersedes the original failure so the
                    // caller learns the ledger needs attention
                    Err(defect) => Err(defect),
                }
            }
        }
    }

    /// Apply the compensating refund entry, retrying before giving up.
    /// A dropped refund breaks the reconciliation invariant, so the final
    /// failure is logged loudly and surfaced as `ReconciliationDefect`.
    async fn refund(&self, reservation: &mut Reservation) -> Result<(), LedgerError> {
        let mut last_error = String::new();

        for attempt in 1..=REFUND_RETRY_ATTEMPTS {
            match self.store.apply_delta(
                &reservation.account_id,
                reservation.cost,
                EntryKind::Refund,
                reservation.action.as_str(),
            ) {
                Ok(_) => {
                    reservation.status = ReservationStatus::Refunded;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        account = reservation.account_id,
                        attempt,
                        error = %e,
                        "Refund attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < REFUND_RETRY_ATTEMPTS {
                        tokio::time::sleep(REFUND_RETRY_BACKOFF).await;
                    }
                }
            }
        }

        // Mark terminal anyway: the hold is accounted for by the defect
        reservation.status = ReservationStatus::Refunded;
        error!(
            account = reservation.account_id,
            amount = reservation.cost,
            action = reservation.action.as_str(),
            "Refund could not be applied; balance and audit trail no longer reconcile"
        );
        Err(LedgerError::ReconciliationDefect {
            account_id: reservation.account_id.clone(),
            amount: reservation.cost,
            detail: last_error,
        })
    }
}
