//! API key lookup.
//!
//! A model's stored key wins. Otherwise the generic `DIFFSCRIBE_API_KEY`
//! variable is tried, then the provider's conventional variable.

use std::env;

use crate::config::ModelConfig;

/// Generic API key variable, tried before provider-specific ones.
pub const API_KEY_ENV: &str = "DIFFSCRIBE_API_KEY";

/// Reads an environment variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Environment variables consulted for `model`, in order.
#[must_use]
pub fn candidate_env_vars(model: &ModelConfig) -> Vec<&'static str> {
    std::iter::once(API_KEY_ENV)
        .chain(model.provider.api_key_env())
        .collect()
}

/// Resolves the API key for `model` using `lookup` for environment access.
pub fn resolve_api_key_with<F>(model: &ModelConfig, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |value: String| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    model.api_key.clone().and_then(non_empty).or_else(|| {
        candidate_env_vars(model)
            .into_iter()
            .find_map(|key| lookup(key).and_then(non_empty))
    })
}

/// Shortens a key for display, keeping a few characters at each end.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
