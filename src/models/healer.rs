//! Repair of the default-model pointer.
//!
//! The pointer is a weak reference and is validated at use time. When it
//! is missing or dangling, a single stored model is promoted silently;
//! with several models the user must pick one. Healing never guesses.

use thiserror::Error;
use tracing::info;

use crate::config::Settings;
use crate::utils::interaction::Interaction;

/// Validity of the default-model pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultState {
    /// The pointer references an existing model.
    Valid,
    /// No pointer is set.
    Missing,
    /// The pointer references a model that no longer exists.
    Dangling(String),
}

/// Classifies the default-model pointer of `settings`.
#[must_use]
pub fn default_state(settings: &Settings) -> DefaultState {
    match settings.default_model_id() {
        None => DefaultState::Missing,
        Some(id) if settings.model_by_id(id).is_some() => DefaultState::Valid,
        Some(id) => DefaultState::Dangling(id.to_string()),
    }
}

/// Result of a healing attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum HealOutcome {
    /// The pointer was already valid; nothing changed.
    AlreadyValid,
    /// No models are stored, so there is nothing to point at.
    NothingToHeal,
    /// A new snapshot with a repaired pointer.
    Healed {
        /// Snapshot to persist.
        settings: Settings,
        /// Id of the new default.
        model_id: String,
        /// True when chosen without asking.
        automatic: bool,
    },
}

/// Healing that could not complete. State is left unchanged.
#[derive(Error, Debug)]
pub enum HealError {
    /// Several models exist and no selection was made.
    #[error("No default model selected ({candidates} models configured); pass a model name or run `diffscribe models default <name>`")]
    NoSelection {
        /// Number of models the user could have chosen from.
        candidates: usize,
    },

    /// The interaction itself failed.
    #[error(transparent)]
    Interaction(#[from] anyhow::Error),
}

/// Restores a valid default-model pointer.
///
/// Returns a new snapshot on success; the caller decides when to save it.
pub fn heal_default_model(
    settings: &Settings,
    interaction: &mut dyn Interaction,
) -> Result<HealOutcome, HealError> {
    let state = default_state(settings);
    if state == DefaultState::Valid {
        return Ok(HealOutcome::AlreadyValid);
    }

    let chosen = match settings.models.as_slice() {
        [] => return Ok(HealOutcome::NothingToHeal),
        [only] => (only.id.clone(), true),
        models => {
            let prompt = match &state {
                DefaultState::Dangling(id) => {
                    format!("The default model '{id}' no longer exists. Choose a new default:")
                }
                _ => "No default model is set. Choose one:".to_string(),
            };
            let choices: Vec<String> = models.iter().map(|m| m.summary()).collect();
            match interaction.select(&prompt, &choices)? {
                Some(index) if index < models.len() => (models[index].id.clone(), false),
                _ => {
                    return Err(HealError::NoSelection {
                        candidates: models.len(),
                    })
                }
            }
        }
    };

    let (model_id, automatic) = chosen;
    let mut next = settings.clone();
    next.default_model_id = Some(model_id.clone());
    info!(?state, model_id, automatic, "Healed default model");
    Ok(HealOutcome::Healed {
        settings: next,
        model_id,
        automatic,
    })
}
