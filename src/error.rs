//! Error types for the token ledger
//!
//! Failures are typed so callers can offer the right remedy:
//! buy tokens (`InsufficientTokens`), wait for tomorrow (`QuotaExceeded`),
//! or upgrade the plan (`FeatureNotAvailable`).

use thiserror::Error;

use crate::ledger::types::SubscriptionPlan;

/// Error type for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No account exists for the given id
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// A debit would drive the balance negative
    #[error("insufficient tokens: need {needed}, have {available}")]
    InsufficientTokens { needed: i64, available: i64 },

    /// Daily reward cap reached for the current calendar day
    #[error("daily reward quota exceeded: {used}/{cap} claims used today")]
    QuotaExceeded { used: u32, cap: u32 },

    /// The action requires a higher subscription plan
    #[error("{action} requires the {required} plan")]
    FeatureNotAvailable {
        action: String,
        required: SubscriptionPlan,
    },

    /// Caller supplied a non-positive amount
    #[error("amount must be a positive integer")]
    InvalidAmount,

    /// Caller supplied an unknown plan name
    #[error("unknown subscription plan: {0}")]
    InvalidPlan(String),

    /// The wrapped external call failed; the reservation has been refunded
    #[error("feature call failed: {0}")]
    SideEffectFailed(String),

    /// A refund could not be applied after retries. The balance and the
    /// audit trail no longer reconcile for this account until the missing
    /// refund entry is applied manually.
    #[error("refund of {amount} tokens for account {account_id} could not be applied: {detail}")]
    ReconciliationDefect {
        account_id: String,
        amount: i64,
        detail: String,
    },

    /// Underlying SQLite failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure locating or creating the database directory
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Stable machine-readable code for transport layers
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "account_not_found",
            Self::InsufficientTokens { .. } => "insufficient_tokens",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::FeatureNotAvailable { .. } => "feature_not_available",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidPlan(_) => "invalid_plan",
            Self::SideEffectFailed(_) => "side_effect_failed",
            Self::ReconciliationDefect { .. } => "reconciliation_defect",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
        }
    }
}

// Hosts with string-typed command boundaries can still surface the message.
impl From<LedgerError> for String {
    fn from(err: LedgerError) -> Self {
        err.to_string()
    }
}
