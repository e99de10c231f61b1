//! Configuration store errors.

use thiserror::Error;

/// Violations of the settings invariants, raised before anything is saved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A model name is empty or whitespace.
    #[error("Model name must not be empty")]
    EmptyName,

    /// Two models share a name, ignoring case.
    #[error("A model named '{0}' already exists")]
    DuplicateName(String),

    /// An alias equals a model name or another alias.
    #[error("Alias '{alias}' is already used by model '{owner}'")]
    AliasCollision {
        /// The rejected alias.
        alias: String,
        /// Name of the model already owning the alias or name.
        owner: String,
    },

    /// An alias is empty or contains whitespace.
    #[error("Invalid alias '{0}': aliases must be non-empty and contain no whitespace")]
    InvalidAlias(String),

    /// No model with this id exists.
    #[error("No model with id '{0}'")]
    UnknownModel(String),
}
