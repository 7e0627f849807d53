//! Paid feature commands
//!
//! The five AI-backed actions. Each wraps the injected `AiClient` call in
//! the reservation ledger, so the cost is reserved before the model call
//! and refunded if it fails.

use serde::{Deserialize, Serialize};

use crate::ai::{
    build_math_prompt, build_translate_prompt, AiClient, CHAT_SYSTEM_PROMPT,
    MATH_STEPS_SYSTEM_PROMPT, MATH_SYSTEM_PROMPT, REWRITE_SYSTEM_PROMPT, TRANSLATE_SYSTEM_PROMPT,
    WRITE_SYSTEM_PROMPT,
};
use crate::error::LedgerError;
use crate::ledger::policy::{FeatureAction, STEP_BY_STEP_MIN_PLAN};
use crate::ledger::LedgerState;

/// Result of a paid feature action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResponse {
    pub reply: String,
    /// Balance after the action committed
    pub tokens: i64,
}

async fn run_feature(
    state: &LedgerState,
    account_id: &str,
    action: FeatureAction,
    ai: &dyn AiClient,
    system_prompt: &'static str,
    user_prompt: String,
) -> Result<FeatureResponse, LedgerError> {
    let reply = state
        .reservations
        .execute(account_id, action, || async move {
            ai.complete(system_prompt, &user_prompt).await
        })
        .await?;

    let account = state.store.get_account(account_id)?;
    Ok(FeatureResponse {
        reply,
        tokens: account.token_balance,
    })
}

/// Send a chat message (1 token)
pub async fn send_chat_message(
    state: &LedgerState,
    ai: &dyn AiClient,
    account_id: &str,
    message: &str,
) -> Result<FeatureResponse, LedgerError> {
    run_feature(
        state,
        account_id,
        FeatureAction::Chat,
        ai,
        CHAT_SYSTEM_PROMPT,
        message.to_string(),
    )
    .await
}

/// Solve a math problem (2 tokens). Step-by-step explanations are a
/// premium tier gate at the same price.
pub async fn solve_math(
    state: &LedgerState,
    ai: &dyn AiClient,
    account_id: &str,
    problem: &str,
    step_by_step: bool,
) -> Result<FeatureResponse, LedgerError> {
    let action = FeatureAction::MathSolve;
    let (required, system_prompt) = if step_by_step {
        (STEP_BY_STEP_MIN_PLAN, MATH_STEPS_SYSTEM_PROMPT)
    } else {
        (action.min_plan(), MATH_SYSTEM_PROMPT)
    };
    let user_prompt = build_math_prompt(problem);

    let reply = state
        .reservations
        .execute_requiring(account_id, action, required, || async move {
            ai.complete(system_prompt, &user_prompt).await
        })
        .await?;

    let account = state.store.get_account(account_id)?;
    Ok(FeatureResponse {
        reply,
        tokens: account.token_balance,
    })
}

/// Rewrite a note for clarity (1 token)
pub async fn rewrite_note(
    state: &LedgerState,
    ai: &dyn AiClient,
    account_id: &str,
    note: &str,
) -> Result<FeatureResponse, LedgerError> {
    run_feature(
        state,
        account_id,
        FeatureAction::NoteRewrite,
        ai,
        REWRITE_SYSTEM_PROMPT,
        note.to_string(),
    )
    .await
}

/// Translate text (1 token)
pub async fn translate_text(
    state: &LedgerState,
    ai: &dyn AiClient,
    account_id: &str,
    text: &str,
    target_language: &str,
) -> Result<FeatureResponse, LedgerError> {
    run_feature(
        state,
        account_id,
        FeatureAction::Translate,
        ai,
        TRANSLATE_SYSTEM_PROMPT,
        build_translate_prompt(text, target_language),
    )
    .await
}

/// Generate free-form text (3 tokens)
pub async fn generate_text(
    state: &LedgerState,
    ai: &dyn AiClient,
    account_id: &str,
    instruction: &str,
) -> Result<FeatureResponse, LedgerError> {
    run_feature(
        state,
        account_id,
        FeatureAction::TextGenerate,
        ai,
        WRITE_SYSTEM_PROMPT,
        instruction.to_string(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ledger::create_account;
    use crate::commands::subscription::change_subscription;
    use crate::ledger::store::SIGNUP_GRANT_TOKENS;
    use crate::ledger::types::EntryKind;
    use async_trait::async_trait;

    struct MockAi {
        reply: Option<String>,
    }

    impl MockAi {
        fn responding(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
            }
        }

        fn failing() -> Self {
            Self { reply: None }
        }
    }

    #[async_trait]
    impl AiClient for MockAi {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, String> {
            self.reply
                .clone()
                .ok_or_else(|| "model unavailable".to_string())
        }
    }

    async fn make_state() -> LedgerState {
        let state = LedgerState::in_memory().unwrap();
        create_account(&state, "acct_1").await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_chat_costs_one_token() {
        let state = make_state().await;
        let ai = MockAi::responding("hello!");

        let response = send_chat_message(&state, &ai, "acct_1", "hi").await.unwrap();
        assert_eq!(response.reply, "hello!");
        assert_eq!(response.tokens, SIGNUP_GRANT_TOKENS - 1);
    }

    #[tokio::test]
    async fn test_generate_text_until_exhausted() {
        // Signup grant is 5; generation costs 3
        let state = make_state().await;
        let ai = MockAi::responding("a poem");

        let response = generate_text(&state, &ai, "acct_1", "write a poem").await.unwrap();
        assert_eq!(response.tokens, 2);

        let err = generate_text(&state, &ai, "acct_1", "another").await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientTokens { .. }));
        assert_eq!(
            state.store.get_account("acct_1").unwrap().token_balance,
            2
        );
    }

    #[tokio::test]
    async fn test_failed_model_call_is_refunded() {
        let state = make_state().await;
        let ai = MockAi::failing();

        let err = solve_math(&state, &ai, "acct_1", "2+2", false).await.unwrap_err();
        assert!(matches!(err, LedgerError::SideEffectFailed(_)));

        // Net zero: use then refund, balance restored
        let account = state.store.get_account("acct_1").unwrap();
        assert_eq!(account.token_balance, SIGNUP_GRANT_TOKENS);
        let entries = state.store.history("acct_1", None).unwrap();
        assert_eq!(entries[0].kind, EntryKind::Refund);
        assert_eq!(entries[1].kind, EntryKind::Use);
        assert_eq!(entries[0].amount + entries[1].amount, 0);
    }

    #[tokio::test]
    async fn test_step_by_step_requires_premium() {
        let state = make_state().await;
        let ai = MockAi::responding("4, because...");

        let err = solve_math(&state, &ai, "acct_1", "2+2", true).await.unwrap_err();
        assert!(matches!(err, LedgerError::FeatureNotAvailable { .. }));
        // Fail-fast: no tokens were reserved
        assert_eq!(
            state.store.get_account("acct_1").unwrap().token_balance,
            SIGNUP_GRANT_TOKENS
        );

        change_subscription(&state, "acct_1", "premium").await.unwrap();
        let response = solve_math(&state, &ai, "acct_1", "2+2", true).await.unwrap();
        assert_eq!(response.tokens, SIGNUP_GRANT_TOKENS - 2);
    }

    #[tokio::test]
    async fn test_translate_and_rewrite_cost_one_each() {
        let state = make_state().await;
        let ai = MockAi::responding("ok");

        let response = translate_text(&state, &ai, "acct_1", "hello", "German").await.unwrap();
        assert_eq!(response.tokens, SIGNUP_GRANT_TOKENS - 1);

        let response = rewrite_note(&state, &ai, "acct_1", "my note").await.unwrap();
        assert_eq!(response.tokens, SIGNUP_GRANT_TOKENS - 2);

        // Every spend reconciles with the audit trail
        assert_eq!(
            state.store.ledger_sum("acct_1").unwrap(),
            state.store.get_account("acct_1").unwrap().token_balance
        );
    }
}
