//! Ledger data types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Subscription plan, ordered by capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Premium,
    Unlimited,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Unlimited => "unlimited",
        }
    }

    /// Parse a plan name from the wire or from storage
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            "unlimited" => Some(Self::Unlimited),
            _ => None,
        }
    }

    /// Paid plans carry an expiry; free does not
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of balance change recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Grant,
    Use,
    Purchase,
    Reward,
    Refund,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Use => "use",
            Self::Purchase => "purchase",
            Self::Reward => "reward",
            Self::Refund => "refund",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "grant" => Some(Self::Grant),
            "use" => Some(Self::Use),
            "purchase" => Some(Self::Purchase),
            "reward" => Some(Self::Reward),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}

/// Per-user account record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    /// Spendable balance. Never negative; always equals the sum of this
    /// account's ledger entry amounts.
    pub token_balance: i64,
    pub subscription_plan: SubscriptionPlan,
    /// Expiry for paid plans; `None` for free. Expiry is a derived
    /// condition: the stored plan is not downgraded until an explicit
    /// renewal or cancel.
    pub subscription_valid_until: Option<DateTime<Utc>>,
    /// Calendar date of the last daily reward claim (local day granularity)
    pub last_video_watch_date: Option<NaiveDate>,
    /// Claims made on `last_video_watch_date`. Meaningful only when that
    /// date is today; otherwise treated as 0 without a physical reset.
    pub watched_videos_today: u32,
}

impl Account {
    /// The plan currently in force, derived from stored plan and expiry
    pub fn effective_plan(&self, now: DateTime<Utc>) -> SubscriptionPlan {
        match self.subscription_valid_until {
            Some(valid_until) if now <= valid_until => self.subscription_plan,
            _ => SubscriptionPlan::Free,
        }
    }

    /// Claims already made on the given calendar day (lazy reset: a stale
    /// date counts as zero)
    pub fn claims_on(&self, day: NaiveDate) -> u32 {
        if self.last_video_watch_date == Some(day) {
            self.watched_videos_today
        } else {
            0
        }
    }
}

/// One immutable, signed record of a balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub account_id: String,
    /// Negative for spends, positive for grants/refunds/purchases
    pub amount: i64,
    pub kind: EntryKind,
    /// Human-readable reason, e.g. which feature was paid for
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of a subscription plan change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEvent {
    pub id: String,
    pub account_id: String,
    pub old_plan: SubscriptionPlan,
    pub new_plan: SubscriptionPlan,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Balance response for command handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub tokens: i64,
}

/// Daily reward claim response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResponse {
    pub tokens: i64,
    pub watched_videos_today: u32,
}

/// Subscription state response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub plan: SubscriptionPlan,
    pub valid_until: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_account(plan: SubscriptionPlan, valid_until: Option<DateTime<Utc>>) -> Account {
        Account {
            id: "acct_1".to_string(),
            token_balance: 10,
            subscription_plan: plan,
            subscription_valid_until: valid_until,
            last_video_watch_date: None,
            watched_videos_today: 0,
        }
    }

    #[test]
    fn test_plan_ordering() {
        assert!(SubscriptionPlan::Free < SubscriptionPlan::Premium);
        assert!(SubscriptionPlan::Premium < SubscriptionPlan::Unlimited);
    }

    #[test]
    fn test_plan_parse_round_trip() {
        for plan in [
            SubscriptionPlan::Free,
            SubscriptionPlan::Premium,
            SubscriptionPlan::Unlimited,
        ] {
            assert_eq!(SubscriptionPlan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(SubscriptionPlan::parse("pro"), None);
    }

    #[test]
    fn test_effective_plan_honors_expiry() {
        let now = Utc::now();

        // Paid and current
        let account = make_account(SubscriptionPlan::Premium, Some(now + Duration::days(10)));
        assert_eq!(account.effective_plan(now), SubscriptionPlan::Premium);

        // Paid but expired: effective plan is free, stored plan untouched
        let account = make_account(SubscriptionPlan::Premium, Some(now - Duration::days(1)));
        assert_eq!(account.effective_plan(now), SubscriptionPlan::Free);
        assert_eq!(account.subscription_plan, SubscriptionPlan::Premium);

        // Free has no expiry
        let account = make_account(SubscriptionPlan::Free, None);
        assert_eq!(account.effective_plan(now), SubscriptionPlan::Free);
    }

    #[test]
    fn test_claims_on_lazy_reset() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let yesterday = today.pred_opt().unwrap();

        let mut account = make_account(SubscriptionPlan::Free, None);
        account.last_video_watch_date = Some(yesterday);
        account.watched_videos_today = 3;

        // Stale date reads as zero without mutating the record
        assert_eq!(account.claims_on(today), 0);
        assert_eq!(account.watched_videos_today, 3);

        account.last_video_watch_date = Some(today);
        assert_eq!(account.claims_on(today), 3);
    }
}
