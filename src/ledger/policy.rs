//! Cost policy for paid feature actions
//!
//! Static lookup from action to token cost and minimum plan. Pure and
//! stateless; the reservation ledger consults it before touching a balance.

use serde::{Deserialize, Serialize};

use super::types::SubscriptionPlan;

/// Paid feature actions metered by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureAction {
    Chat,
    MathSolve,
    NoteRewrite,
    Translate,
    TextGenerate,
}

impl FeatureAction {
    /// Identifier used in audit entry descriptions
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::MathSolve => "math_solve",
            Self::NoteRewrite => "note_rewrite",
            Self::Translate => "translate",
            Self::TextGenerate => "text_generate",
        }
    }

    /// Fixed token cost per invocation
    pub fn cost(&self) -> i64 {
        match self {
            Self::Chat => 1,
            Self::MathSolve => 2,
            Self::NoteRewrite => 1,
            Self::Translate => 1,
            Self::TextGenerate => 3,
        }
    }

    /// Minimum plan required to run the action at all. Every base action is
    /// available on the free plan; tier-only gates (like step-by-step math)
    /// layer on top without changing the price.
    pub fn min_plan(&self) -> SubscriptionPlan {
        SubscriptionPlan::Free
    }
}

impl std::fmt::Display for FeatureAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan required for step-by-step math explanations. A pure tier gate: the
/// base solve cost is unchanged.
pub const STEP_BY_STEP_MIN_PLAN: SubscriptionPlan = SubscriptionPlan::Premium;

/// Whether a plan satisfies a requirement in the ordering
/// `free < premium < unlimited`
pub fn eligible(plan: SubscriptionPlan, required: SubscriptionPlan) -> bool {
    plan >= required
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_costs() {
        assert_eq!(FeatureAction::Chat.cost(), 1);
        assert_eq!(FeatureAction::MathSolve.cost(), 2);
        assert_eq!(FeatureAction::NoteRewrite.cost(), 1);
        assert_eq!(FeatureAction::Translate.cost(), 1);
        assert_eq!(FeatureAction::TextGenerate.cost(), 3);
    }

    #[test]
    fn test_eligibility_ordering() {
        assert!(eligible(SubscriptionPlan::Free, SubscriptionPlan::Free));
        assert!(!eligible(SubscriptionPlan::Free, SubscriptionPlan::Premium));
        assert!(eligible(SubscriptionPlan::Premium, SubscriptionPlan::Premium));
        assert!(!eligible(SubscriptionPlan::Premium, SubscriptionPlan::Unlimited));
        assert!(eligible(SubscriptionPlan::Unlimited, SubscriptionPlan::Free));
    }

    #[test]
    fn test_step_by_step_is_tier_gated_not_priced() {
        assert!(eligible(STEP_BY_STEP_MIN_PLAN, SubscriptionPlan::Premium));
        // Gate does not change the base cost
        assert_eq!(FeatureAction::MathSolve.cost(), 2);
    }
}
