//! Token estimation and prompt budgeting.
//!
//! Provides a lightweight heuristic to estimate token counts from text and
//! the inverse conversion used to turn a token allowance into a character
//! budget for diff truncation. Not tied to any real tokenizer.

use crate::config::{ModelConfig, Pricing};

/// Approximate characters per token for heuristic estimation.
///
/// Tokenizers average roughly 3.5 characters per token for English text
/// with code mixed in.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Safety margin multiplier applied to token estimates.
///
/// Adds 10% overhead to account for tokenizer variance (special tokens,
/// whitespace handling, non-ASCII characters).
const SAFETY_MARGIN: f64 = 1.10;

/// Context window assumed when neither the provider nor the stored model
/// configuration reports one.
pub const CONSERVATIVE_CONTEXT_TOKENS: usize = 4_096;

/// Estimates the token count for a text string using a character-based heuristic.
///
/// Uses the approximation of 1 token per 3.5 characters with a 10% safety
/// margin. Overestimates on purpose.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_char_count(text.len())
}

/// Estimates token count from a byte count without requiring a string reference.
#[must_use]
pub fn estimate_tokens_from_char_count(char_count: usize) -> usize {
    let raw_estimate = char_count as f64 / CHARS_PER_TOKEN;
    (raw_estimate * SAFETY_MARGIN).ceil() as usize
}

/// Converts a token allowance back into a character budget.
///
/// Inverse of [`estimate_tokens_from_char_count`], rounded down so that
/// `estimate_tokens_from_char_count(chars_for_tokens(t)) <= t`.
#[must_use]
pub fn chars_for_tokens(tokens: usize) -> usize {
    let mut chars = ((tokens as f64 / SAFETY_MARGIN) * CHARS_PER_TOKEN).floor() as usize;
    // Float rounding can land one character past the allowance.
    while chars > 0 && estimate_tokens_from_char_count(chars) > tokens {
        chars -= 1;
    }
    chars
}

/// Estimated size and cost of one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEstimate {
    /// Estimated prompt tokens (system + user).
    pub prompt_tokens: usize,
    /// Tokens the model may generate at most.
    pub max_output_tokens: usize,
    /// Context window used for budgeting.
    pub context_length: usize,
    /// Worst-case cost in USD, when pricing is known.
    pub estimated_cost: Option<f64>,
}

impl RequestEstimate {
    /// Estimates a request for `model` with the given prompts.
    #[must_use]
    pub fn for_prompts(model: &ModelConfig, system_prompt: &str, user_prompt: &str) -> Self {
        Self::for_prompts_in_window(
            model,
            context_window(model, None),
            system_prompt,
            user_prompt,
        )
    }

    /// Estimates a request against an explicit context window, such as
    /// one reported by the provider.
    #[must_use]
    pub fn for_prompts_in_window(
        model: &ModelConfig,
        context_length: usize,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Self {
        let prompt_tokens = estimate_tokens(system_prompt) + estimate_tokens(user_prompt);
        let max_output_tokens = model.max_output_tokens as usize;
        Self {
            prompt_tokens,
            max_output_tokens,
            context_length,
            estimated_cost: model
                .pricing
                .as_ref()
                .map(|p| p.cost(prompt_tokens, max_output_tokens)),
        }
    }

    /// Returns whether the estimate exceeds the context window.
    #[must_use]
    pub fn exceeds_context(&self) -> bool {
        self.prompt_tokens + self.max_output_tokens > self.context_length
    }

    /// Utilization of the context window in percent (0.0 to 100.0+).
    #[must_use]
    pub fn utilization_pct(&self) -> f64 {
        if self.context_length == 0 {
            return f64::INFINITY;
        }
        (self.prompt_tokens + self.max_output_tokens) as f64 / self.context_length as f64 * 100.0
    }
}

impl Pricing {
    /// Cost in USD for the given token counts.
    #[must_use]
    pub fn cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Context window for budgeting: the provider-reported window, else the
/// model's configured `context_length`, else [`CONSERVATIVE_CONTEXT_TOKENS`].
#[must_use]
pub fn context_window(model: &ModelConfig, max_context: Option<usize>) -> usize {
    max_context
        .or(model.context_length)
        .unwrap_or(CONSERVATIVE_CONTEXT_TOKENS)
}

/// Computes the character budget left for the diff after reserving the
/// prompt scaffold and the model's completion allowance.
///
/// `max_context` is the provider-reported window when known; otherwise the
/// model's configured `context_length`, and finally
/// [`CONSERVATIVE_CONTEXT_TOKENS`].
#[must_use]
pub fn diff_char_budget(
    model: &ModelConfig,
    max_context: Option<usize>,
    scaffold_tokens: usize,
) -> usize {
    let available = context_window(model, max_context)
        .saturating_sub(scaffold_tokens)
        .saturating_sub(model.max_output_tokens as usize);
    chars_for_tokens(available)
}
