//! Stored model configurations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default completion allowance for newly created models.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;

/// Default sampling temperature for newly created models.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Kind of OpenAI-compatible backend a model talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// api.openai.com or any hosted OpenAI-compatible service.
    #[default]
    OpenAi,
    /// OpenRouter.
    OpenRouter,
    /// Local Ollama instance.
    Ollama,
    /// Anything else speaking the chat completions protocol.
    Custom,
}

impl ProviderType {
    /// Base URL used when a model is created without one.
    #[must_use]
    pub fn default_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::OpenRouter => "https://openrouter.ai/api",
            Self::Ollama => "http://localhost:11434",
            Self::Custom => "http://localhost:8080",
        }
    }

    /// Conventional environment variable holding this provider's API key.
    #[must_use]
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Ollama | Self::Custom => None,
        }
    }

    /// Whether requests need a bearer token by default.
    #[must_use]
    pub fn requires_auth_by_default(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::OpenRouter => write!(f, "openrouter"),
            Self::Ollama => write!(f, "ollama"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown provider '{other}' (expected openai, openrouter, ollama or custom)"
            )),
        }
    }
}

/// Per-token pricing in USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Price of one million prompt tokens.
    pub input_per_million: f64,
    /// Price of one million completion tokens.
    pub output_per_million: f64,
}

/// A named backend configuration.
///
/// `name` is unique case-insensitively. Every alias is unique across all
/// models and distinct from every model name, ignoring case and a leading
/// `@`. Both rules are enforced by [`Settings::validate`](super::Settings::validate)
/// before any save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Stable internal identifier.
    pub id: String,
    /// Display name, also the model identifier sent to the API.
    pub name: String,
    /// Upstream model identifier when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
    /// Shorthand names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Backend kind.
    #[serde(default, rename = "type")]
    pub provider: ProviderType,
    /// Base URL of the chat completions endpoint.
    pub url: String,
    /// Stored API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Whether a bearer token is sent.
    #[serde(default = "default_true")]
    pub requires_auth: bool,
    /// Completion allowance.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Send `max_tokens` instead of `max_completion_tokens`.
    #[serde(default)]
    pub use_legacy_max_tokens: bool,
    /// Context window in tokens, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<usize>,
    /// Token pricing, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    /// Replaces the built-in system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Last successful generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl ModelConfig {
    /// Creates a model with a fresh id and default generation parameters.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            api_model: None,
            aliases: Vec::new(),
            provider: ProviderType::default(),
            url: url.into(),
            api_key: None,
            requires_auth: true,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            use_legacy_max_tokens: false,
            context_length: None,
            pricing: None,
            system_prompt: None,
            last_used: None,
        }
    }

    /// Model identifier sent in the request body.
    #[must_use]
    pub fn api_model(&self) -> &str {
        self.api_model.as_deref().unwrap_or(&self.name)
    }

    /// Aliases rendered with their `@` prefix for display.
    #[must_use]
    pub fn display_aliases(&self) -> String {
        self.aliases
            .iter()
            .map(|a| format!("@{}", normalize_alias(a)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One-line description used in candidate lists and errors.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!("{} ({}, {})", self.name, self.provider, self.url);
        if !self.aliases.is_empty() {
            line.push_str(&format!(" [{}]", self.display_aliases()));
        }
        line
    }
}

/// Case- and `@`-insensitive form of an alias or identifier.
#[must_use]
pub fn normalize_alias(alias: &str) -> String {
    let trimmed = alias.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_lowercase()
}
