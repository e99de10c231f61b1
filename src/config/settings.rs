//! The persisted settings snapshot and its invariants.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::model::{normalize_alias, ModelConfig};

/// Default minimum identifier length for prefix matching.
pub const DEFAULT_MIN_PARTIAL_MATCH_LENGTH: usize = 3;

/// Application settings: the ordered model collection plus toggles.
///
/// A loaded `Settings` is an immutable snapshot. The `with_*` methods
/// return a new, validated snapshot instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Stored models in creation order.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Weak reference to the default model's `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model_id: Option<String>,
    /// Allow prefix matching of model identifiers.
    #[serde(default = "default_true")]
    pub partial_match_enabled: bool,
    /// Minimum identifier length before prefix matching applies.
    #[serde(default = "default_min_partial_match_length")]
    pub min_partial_match_length: usize,
    /// Ask before sending a request.
    #[serde(default)]
    pub require_confirmation: bool,
    /// Copy generated messages to the clipboard.
    #[serde(default)]
    pub copy_to_clipboard: bool,
    /// Print token usage after generation.
    #[serde(default)]
    pub show_usage: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_partial_match_length() -> usize {
    DEFAULT_MIN_PARTIAL_MATCH_LENGTH
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            default_model_id: None,
            partial_match_enabled: true,
            min_partial_match_length: DEFAULT_MIN_PARTIAL_MATCH_LENGTH,
            require_confirmation: false,
            copy_to_clipboard: false,
            show_usage: false,
        }
    }
}

impl Settings {
    /// Looks up a model by internal id.
    #[must_use]
    pub fn model_by_id(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Looks up a model by id, then by case-insensitive name.
    #[must_use]
    pub fn model_by_id_or_name(&self, key: &str) -> Option<&ModelConfig> {
        self.model_by_id(key)
            .or_else(|| self.models.iter().find(|m| m.name.eq_ignore_ascii_case(key)))
    }

    /// The default-model pointer, treating an empty string as absent.
    #[must_use]
    pub fn default_model_id(&self) -> Option<&str> {
        self.default_model_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Checks name and alias uniqueness across the whole collection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names: HashMap<String, &str> = HashMap::new();
        // Names keyed the way aliases are, so `@free` and `free` collide.
        let mut alias_keys: HashMap<String, &str> = HashMap::new();
        for model in &self.models {
            let name = model.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if let Some(existing) = names.insert(name.to_lowercase(), &model.name) {
                return Err(ConfigError::DuplicateName(existing.to_string()));
            }
            alias_keys.insert(normalize_alias(name), &model.name);
        }

        let mut aliases: HashMap<String, &str> = HashMap::new();
        for model in &self.models {
            for alias in &model.aliases {
                let key = normalize_alias(alias);
                if key.is_empty() || key.chars().any(char::is_whitespace) {
                    return Err(ConfigError::InvalidAlias(alias.clone()));
                }
                if let Some(owner) = alias_keys.get(&key) {
                    return Err(ConfigError::AliasCollision {
                        alias: alias.clone(),
                        owner: (*owner).to_string(),
                    });
                }
                if let Some(owner) = aliases.insert(key, &model.name) {
                    return Err(ConfigError::AliasCollision {
                        alias: alias.clone(),
                        owner: owner.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns a snapshot with `model` appended.
    ///
    /// The first model added becomes the default.
    pub fn with_model_added(&self, model: ModelConfig) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if next.models.is_empty() {
            next.default_model_id = Some(model.id.clone());
        }
        next.models.push(model);
        next.validate()?;
        Ok(next)
    }

    /// Returns a snapshot with the model sharing `model.id` replaced.
    pub fn with_model_updated(&self, model: ModelConfig) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        let slot = next
            .models
            .iter_mut()
            .find(|m| m.id == model.id)
            .ok_or_else(|| ConfigError::UnknownModel(model.id.clone()))?;
        *slot = model;
        next.validate()?;
        Ok(next)
    }

    /// Returns a snapshot without the model `id`.
    ///
    /// Clears the default pointer if it referenced the removed model.
    pub fn with_model_deleted(&self, id: &str) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        let before = next.models.len();
        next.models.retain(|m| m.id != id);
        if next.models.len() == before {
            return Err(ConfigError::UnknownModel(id.to_string()));
        }
        if next.default_model_id() == Some(id) {
            next.default_model_id = None;
        }
        Ok(next)
    }

    /// Returns a snapshot whose default points at `id`.
    pub fn with_default_model(&self, id: &str) -> Result<Self, ConfigError> {
        if self.model_by_id(id).is_none() {
            return Err(ConfigError::UnknownModel(id.to_string()));
        }
        let mut next = self.clone();
        next.default_model_id = Some(id.to_string());
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn model(name: &str, aliases: &[&str]) -> ModelConfig {
        let mut m = ModelConfig::new(name, "http://localhost:11434");
        m.aliases = aliases.iter().map(|a| (*a).to_string()).collect();
        m
    }

    #[test]
    fn first_model_is_promoted_to_default() {
        let first = model("gpt4", &[]);
        let first_id = first.id.clone();
        let settings = Settings::default().with_model_added(first).unwrap();
        assert_eq!(settings.default_model_id(), Some(first_id.as_str()));

        let settings = settings.with_model_added(model("llama", &[])).unwrap();
        assert_eq!(settings.default_model_id(), Some(first_id.as_str()));
    }

    #[test]
    fn duplicate_name_is_rejected_case_insensitively() {
        let settings = Settings::default()
            .with_model_added(model("Llama", &[]))
            .unwrap();
        let err = settings.with_model_added(model("llama", &[])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(_)));
    }

    #[test]
    fn alias_colliding_with_name_is_rejected() {
        let settings = Settings::default()
            .with_model_added(model("llama", &[]))
            .unwrap();
        let err = settings
            .with_model_added(model("gpt4", &["@Llama"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AliasCollision { ref owner, .. } if owner == "llama"));
    }

    #[test]
    fn alias_colliding_with_at_prefixed_name_is_rejected() {
        let settings = Settings::default()
            .with_model_added(model("@free", &[]))
            .unwrap();
        let err = settings
            .with_model_added(model("llama", &["free"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AliasCollision { ref owner, .. } if owner == "@free"));
    }

    #[test]
    fn alias_colliding_with_other_alias_is_rejected() {
        let settings = Settings::default()
            .with_model_added(model("gpt4", &["fast"]))
            .unwrap();
        let err = settings
            .with_model_added(model("llama", &["@FAST"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AliasCollision { .. }));
    }

    #[test]
    fn alias_colliding_with_own_name_or_alias_is_rejected() {
        let own_name = Settings::default().with_model_added(model("gpt4", &["gpt4"]));
        assert!(own_name.is_err());
        let repeated = Settings::default().with_model_added(model("gpt4", &["g", "@g"]));
        assert!(repeated.is_err());
    }

    #[test]
    fn empty_alias_is_rejected() {
        let err = Settings::default()
            .with_model_added(model("gpt4", &["@"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAlias(_)));
    }

    #[test]
    fn failed_mutation_leaves_original_snapshot_untouched() {
        let settings = Settings::default()
            .with_model_added(model("gpt4", &[]))
            .unwrap();
        let _ = settings.with_model_added(model("GPT4", &[]));
        assert_eq!(settings.models.len(), 1);
    }

    #[test]
    fn deleting_default_clears_pointer() {
        let first = model("gpt4", &[]);
        let id = first.id.clone();
        let settings = Settings::default()
            .with_model_added(first)
            .unwrap()
            .with_model_added(model("llama", &[]))
            .unwrap();
        let settings = settings.with_model_deleted(&id).unwrap();
        assert_eq!(settings.default_model_id(), None);
        assert_eq!(settings.models.len(), 1);
    }

    #[test]
    fn update_unknown_model_fails() {
        let err = Settings::default()
            .with_model_updated(model("ghost", &[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(_)));
    }

    #[test]
    fn empty_default_pointer_reads_as_missing() {
        let settings = Settings {
            default_model_id: Some(String::new()),
            ..Settings::default()
        };
        assert_eq!(settings.default_model_id(), None);
    }

    #[test]
    fn toggles_default_when_absent_from_json() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.partial_match_enabled);
        assert_eq!(settings.min_partial_match_length, 3);
    }
}
