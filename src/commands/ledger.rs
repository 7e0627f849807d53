//! Commands for balances, token grants, and the audit trail

use crate::error::LedgerError;
use crate::ledger::types::{BalanceResponse, EntryKind, LedgerEntry, RewardResponse};
use crate::ledger::LedgerState;

/// Create an account with its signup grant
pub async fn create_account(
    state: &LedgerState,
    account_id: &str,
) -> Result<BalanceResponse, LedgerError> {
    let account = state.store.create_account(account_id)?;
    Ok(BalanceResponse {
        tokens: account.token_balance,
    })
}

/// Get the current token balance
pub async fn get_balance(
    state: &LedgerState,
    account_id: &str,
) -> Result<BalanceResponse, LedgerError> {
    let account = state.store.get_account(account_id)?;
    Ok(BalanceResponse {
        tokens: account.token_balance,
    })
}

/// Credit purchased tokens
pub async fn purchase_tokens(
    state: &LedgerState,
    account_id: &str,
    amount: i64,
) -> Result<BalanceResponse, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    let account = state
        .store
        .apply_delta(account_id, amount, EntryKind::Purchase, "token purchase")?;
    Ok(BalanceResponse {
        tokens: account.token_balance,
    })
}

/// Spend tokens directly, outside a feature action
pub async fn spend_tokens(
    state: &LedgerState,
    account_id: &str,
    amount: i64,
) -> Result<BalanceResponse, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    let account = state
        .store
        .apply_delta(account_id, -amount, EntryKind::Use, "direct spend")?;
    Ok(BalanceResponse {
        tokens: account.token_balance,
    })
}

/// Claim today's daily reward
pub async fn claim_daily_reward(
    state: &LedgerState,
    account_id: &str,
) -> Result<RewardResponse, LedgerError> {
    let account = state.rewards.claim(account_id)?;
    Ok(RewardResponse {
        tokens: account.token_balance,
        watched_videos_today: account.watched_videos_today,
    })
}

/// Audit history, most recent first
pub async fn get_ledger_history(
    state: &LedgerState,
    account_id: &str,
    limit: Option<usize>,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    state.store.history(account_id, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::SIGNUP_GRANT_TOKENS;

    async fn make_state() -> LedgerState {
        let state = LedgerState::in_memory().unwrap();
        create_account(&state, "acct_1").await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_create_and_get_balance() {
        let state = make_state().await;
        let balance = get_balance(&state, "acct_1").await.unwrap();
        assert_eq!(balance.tokens, SIGNUP_GRANT_TOKENS);
    }

    #[tokio::test]
    async fn test_purchase_rejects_non_positive_amounts() {
        let state = make_state().await;
        for amount in [0, -5] {
            let err = purchase_tokens(&state, "acct_1", amount).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount));
        }
    }

    #[tokio::test]
    async fn test_purchase_credits_balance() {
        let state = make_state().await;
        let balance = purchase_tokens(&state, "acct_1", 20).await.unwrap();
        assert_eq!(balance.tokens, SIGNUP_GRANT_TOKENS + 20);
    }

    #[tokio::test]
    async fn test_spend_respects_balance() {
        let state = make_state().await;

        let balance = spend_tokens(&state, "acct_1", 3).await.unwrap();
        assert_eq!(balance.tokens, SIGNUP_GRANT_TOKENS - 3);

        let err = spend_tokens(&state, "acct_1", 100).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientTokens { .. }));

        let err = spend_tokens(&state, "acct_1", 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_reward_response_reports_claim_count() {
        let state = make_state().await;
        let response = claim_daily_reward(&state, "acct_1").await.unwrap();
        assert_eq!(response.tokens, SIGNUP_GRANT_TOKENS + 2);
        assert_eq!(response.watched_videos_today, 1);
    }

    #[tokio::test]
    async fn test_history_pages_newest_first() {
        let state = make_state().await;
        purchase_tokens(&state, "acct_1", 10).await.unwrap();
        spend_tokens(&state, "acct_1", 1).await.unwrap();

        let history = get_ledger_history(&state, "acct_1", None).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, -1);
        assert_eq!(history[1].amount, 10);

        let page = get_ledger_history(&state, "acct_1", Some(1)).await.unwrap();
        assert_eq!(page.len(), 1);
    }
}
