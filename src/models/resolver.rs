//! Layered resolution of user-supplied model identifiers.
//!
//! Matching stops at the first layer that produces a result:
//!
//! 1. exact internal `id`
//! 2. case-insensitive `name`
//! 3. case-insensitive alias, ignoring a leading `@` on either side
//! 4. case-insensitive prefix of any name or alias, only when partial
//!    matching is enabled and the identifier is long enough
//!
//! A failed lookup never falls back to the default model.

use tracing::debug;

use crate::config::{normalize_alias, ModelConfig, Settings};

/// Which layer produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Internal id.
    Id,
    /// Model name.
    Name,
    /// Alias.
    Alias,
    /// Unique prefix of a name or alias.
    Prefix,
}

/// Result of resolving an identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    /// Exactly one model matched.
    Found(&'a ModelConfig, MatchKind),
    /// Several models share the prefix; the caller must choose.
    Ambiguous(Vec<&'a ModelConfig>),
    /// Nothing matched.
    NotFound,
}

impl<'a> Resolution<'a> {
    /// Returns the resolved model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&'a ModelConfig> {
        match self {
            Self::Found(model, _) => Some(model),
            Self::Ambiguous(_) | Self::NotFound => None,
        }
    }
}

/// Resolves identifiers against one settings snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ModelResolver<'a> {
    settings: &'a Settings,
}

impl<'a> ModelResolver<'a> {
    /// Creates a resolver over `settings`.
    #[must_use]
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Resolves `identifier` to a stored model.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Resolution<'a> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Resolution::NotFound;
        }

        let resolution = self
            .by_id(identifier)
            .map(|m| Resolution::Found(m, MatchKind::Id))
            .or_else(|| {
                self.by_name(identifier)
                    .map(|m| Resolution::Found(m, MatchKind::Name))
            })
            .or_else(|| {
                self.by_alias(identifier)
                    .map(|m| Resolution::Found(m, MatchKind::Alias))
            })
            .unwrap_or_else(|| self.by_prefix(identifier));

        debug!(
            identifier,
            resolved = ?resolution.model().map(|m| m.name.as_str()),
            "Resolved model identifier"
        );
        resolution
    }

    fn by_id(&self, identifier: &str) -> Option<&'a ModelConfig> {
        self.settings.models.iter().find(|m| m.id == identifier)
    }

    fn by_name(&self, identifier: &str) -> Option<&'a ModelConfig> {
        let wanted = identifier.to_lowercase();
        self.settings
            .models
            .iter()
            .find(|m| m.name.to_lowercase() == wanted)
    }

    fn by_alias(&self, identifier: &str) -> Option<&'a ModelConfig> {
        let wanted = normalize_alias(identifier);
        if wanted.is_empty() {
            return None;
        }
        self.settings
            .models
            .iter()
            .find(|m| m.aliases.iter().any(|a| normalize_alias(a) == wanted))
    }

    fn by_prefix(&self, identifier: &str) -> Resolution<'a> {
        if !self.settings.partial_match_enabled {
            return Resolution::NotFound;
        }
        // The minimum length counts the identifier without its `@`, so
        // `@ll` does not clear a minimum of 3.
        let prefix = normalize_alias(identifier);
        if prefix.is_empty() || prefix.chars().count() < self.settings.min_partial_match_length {
            return Resolution::NotFound;
        }

        let candidates: Vec<&ModelConfig> = self
            .settings
            .models
            .iter()
            .filter(|m| {
                m.name.to_lowercase().starts_with(&prefix)
                    || m.aliases
                        .iter()
                        .any(|a| normalize_alias(a).starts_with(&prefix))
            })
            .collect();

        match candidates.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(candidates[0], MatchKind::Prefix),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model(name: &str, aliases: &[&str]) -> ModelConfig {
        let mut m = ModelConfig::new(name, "http://localhost:11434");
        m.aliases = aliases.iter().map(|a| (*a).to_string()).collect();
        m
    }

    fn settings(models: Vec<ModelConfig>) -> Settings {
        Settings {
            models,
            ..Settings::default()
        }
    }

    fn found_name(resolution: &Resolution<'_>) -> Option<String> {
        resolution.model().map(|m| m.name.clone())
    }

    #[test]
    fn alias_lookup_is_case_insensitive() {
        let s = settings(vec![model("gpt4", &["g4"]), model("llama", &[])]);
        let resolution = ModelResolver::new(&s).resolve("G4");
        assert_eq!(found_name(&resolution).as_deref(), Some("gpt4"));
        assert!(matches!(resolution, Resolution::Found(_, MatchKind::Alias)));
    }

    #[test]
    fn single_prefix_candidate_resolves() {
        let s = settings(vec![model("llama", &[])]);
        let resolution = ModelResolver::new(&s).resolve("lla");
        assert_eq!(found_name(&resolution).as_deref(), Some("llama"));
        assert!(matches!(resolution, Resolution::Found(_, MatchKind::Prefix)));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let s = settings(vec![model("gpt4", &["g4"]), model("llama", &[])]);
        assert_eq!(ModelResolver::new(&s).resolve("xyz"), Resolution::NotFound);
    }

    #[test]
    fn exact_id_wins_over_everything() {
        let target = model("target", &[]);
        let id = target.id.clone();
        // A model whose name equals the other model's id must not shadow it.
        let s = settings(vec![model(&id.to_uppercase(), &[]), target]);
        let resolution = ModelResolver::new(&s).resolve(&id);
        assert_eq!(found_name(&resolution).as_deref(), Some("target"));
        assert!(matches!(resolution, Resolution::Found(_, MatchKind::Id)));
    }

    #[test]
    fn at_prefix_is_ignored_on_both_sides() {
        let s = settings(vec![model("free-model", &["free"]), model("paid", &["@pro"])]);
        let resolver = ModelResolver::new(&s);
        for query in ["free", "@free", "FREE", "@Free"] {
            assert_eq!(
                found_name(&resolver.resolve(query)).as_deref(),
                Some("free-model"),
                "query {query}"
            );
        }
        for query in ["pro", "@pro"] {
            assert_eq!(found_name(&resolver.resolve(query)).as_deref(), Some("paid"));
        }
    }

    #[test]
    fn multiple_prefix_candidates_are_ambiguous() {
        let s = settings(vec![
            model("gpt-4o", &[]),
            model("gpt-4o-mini", &[]),
            model("llama", &[]),
        ]);
        match ModelResolver::new(&s).resolve("gpt") {
            Resolution::Ambiguous(candidates) => {
                let names: Vec<_> = candidates.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, vec!["gpt-4o", "gpt-4o-mini"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn exact_name_beats_longer_prefix_matches() {
        let s = settings(vec![model("gpt-4o", &[]), model("gpt-4o-mini", &[])]);
        assert_eq!(
            found_name(&ModelResolver::new(&s).resolve("GPT-4O")).as_deref(),
            Some("gpt-4o")
        );
    }

    #[test]
    fn prefix_matches_aliases_too() {
        let s = settings(vec![model("meta-llama-3", &["local"]), model("gpt4", &[])]);
        assert_eq!(
            found_name(&ModelResolver::new(&s).resolve("@loc")).as_deref(),
            Some("meta-llama-3")
        );
    }

    #[test]
    fn model_matching_by_name_and_alias_prefix_is_one_candidate() {
        let s = settings(vec![model("llama", &["llama-local"])]);
        assert!(matches!(
            ModelResolver::new(&s).resolve("lla"),
            Resolution::Found(_, MatchKind::Prefix)
        ));
    }

    #[test]
    fn disabled_partial_matching_never_uses_prefixes() {
        let mut s = settings(vec![model("llama", &[])]);
        s.partial_match_enabled = false;
        assert_eq!(ModelResolver::new(&s).resolve("lla"), Resolution::NotFound);
    }

    #[test]
    fn short_identifiers_never_use_prefixes() {
        let mut s = settings(vec![model("llama", &[])]);
        s.min_partial_match_length = 4;
        assert_eq!(ModelResolver::new(&s).resolve("lla"), Resolution::NotFound);
        assert_eq!(ModelResolver::new(&s).resolve("@lla"), Resolution::NotFound);
        assert!(ModelResolver::new(&s).resolve("llam").model().is_some());
    }

    #[test]
    fn at_sign_does_not_count_toward_minimum_length() {
        let s = settings(vec![model("llama", &[])]);
        assert_eq!(s.min_partial_match_length, 3);
        assert_eq!(ModelResolver::new(&s).resolve("@ll"), Resolution::NotFound);
        assert!(ModelResolver::new(&s).resolve("@lla").model().is_some());
    }

    #[test]
    fn empty_identifier_is_not_found() {
        let s = settings(vec![model("llama", &[])]);
        assert_eq!(ModelResolver::new(&s).resolve("  "), Resolution::NotFound);
        assert_eq!(ModelResolver::new(&s).resolve("@"), Resolution::NotFound);
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,12}"
    }

    proptest! {
        #[test]
        fn name_lookup_ignores_case(names in proptest::collection::hash_set(name_strategy(), 1..6)) {
            let s = settings(names.iter().map(|n| model(n, &[])).collect());
            let resolver = ModelResolver::new(&s);
            for stored in &s.models {
                for query in [stored.name.clone(), stored.name.to_lowercase(), stored.name.to_uppercase()] {
                    let resolved = resolver.resolve(&query).model().map(|m| m.id.clone());
                    prop_assert_eq!(resolved, Some(stored.id.clone()));
                }
            }
        }

        #[test]
        fn at_and_bare_alias_agree(alias in name_strategy()) {
            let s = settings(vec![model("Stored-Model-Name", &[alias.as_str()])]);
            let resolver = ModelResolver::new(&s);
            let bare = resolver.resolve(&alias).model().map(|m| m.id.clone());
            let at = resolver.resolve(&format!("@{alias}")).model().map(|m| m.id.clone());
            prop_assert!(bare.is_some());
            prop_assert_eq!(bare, at);
        }

        #[test]
        fn no_prefix_resolution_below_threshold(
            names in proptest::collection::hash_set(name_strategy(), 1..6),
            min_len in 1usize..8,
            enabled in any::<bool>(),
        ) {
            let mut s = settings(names.iter().map(|n| model(&format!("{n}-suffix"), &[])).collect());
            s.partial_match_enabled = enabled;
            s.min_partial_match_length = min_len;
            let resolver = ModelResolver::new(&s);
            for stored in &s.models {
                let short: String = stored.name.chars().take(min_len - 1).collect();
                if !short.is_empty() && short != stored.name {
                    let resolution = resolver.resolve(&short);
                    prop_assert!(
                        !matches!(resolution, Resolution::Found(_, MatchKind::Prefix) | Resolution::Ambiguous(_)),
                        "prefix {} resolved below threshold", short
                    );
                }
                if !enabled {
                    let prefix: String = stored.name.chars().take(min_len).collect();
                    if prefix != stored.name {
                        let resolution = resolver.resolve(&prefix);
                        prop_assert!(
                            !matches!(resolution, Resolution::Found(_, MatchKind::Prefix) | Resolution::Ambiguous(_)),
                            "prefix {} resolved with partial matching disabled", prefix
                        );
                    }
                }
            }
        }
    }
}
