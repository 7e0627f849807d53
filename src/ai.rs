//! AI collaborator seam
//!
//! The ledger never generates AI responses itself; feature handlers pass
//! the model call in as an injected collaborator so it can fail, time out,
//! or be replaced with a test double without touching ledger state.

use async_trait::async_trait;

/// External AI model client. Implementations wrap whatever provider the
/// host uses; errors are surfaced as strings and trigger a refund of the
/// reserved tokens.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Run a single completion and return the response text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, String>;
}

/// System prompt for the chat assistant
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant inside a note-taking app.

RULES:
1. Answer concisely and directly
2. If the question refers to the user's notes, answer from the message content only
3. Never invent sources"#;

/// System prompt for math solving
pub const MATH_SYSTEM_PROMPT: &str = r#"You are a math solver.

RULES:
1. Output the final answer on the first line
2. Do not show intermediate work unless asked"#;

/// System prompt for step-by-step math explanations (premium gate)
pub const MATH_STEPS_SYSTEM_PROMPT: &str = r#"You are a math tutor.

RULES:
1. Output the final answer on the first line
2. Follow with a numbered list of solution steps
3. Keep each step to one sentence"#;

/// System prompt for note rewriting
pub const REWRITE_SYSTEM_PROMPT: &str = r#"You are a writing assistant. Rewrite the given note to be clearer and better organized.

RULES:
1. Preserve the meaning and every factual detail
2. Keep the author's language
3. Output only the rewritten note"#;

/// System prompt for translation
pub const TRANSLATE_SYSTEM_PROMPT: &str = r#"You are a translator.

RULES:
1. Output only the translation, no commentary
2. Preserve formatting and line breaks"#;

/// System prompt for free-form text generation
pub const WRITE_SYSTEM_PROMPT: &str = r#"You are a writing assistant. Produce the requested text.

RULES:
1. Follow the instruction exactly
2. Output only the generated text"#;

/// Build the user prompt for a translation request
pub fn build_translate_prompt(text: &str, target_language: &str) -> String {
    format!(
        r#"Translate the following text to {target_language}:

---
{text}
---"#
    )
}

/// Build the user prompt for a math request
pub fn build_math_prompt(problem: &str) -> String {
    format!("Solve: {problem}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_prompt_names_target_language() {
        let prompt = build_translate_prompt("hello", "German");
        assert!(prompt.contains("German"));
        assert!(prompt.contains("hello"));
    }
}
