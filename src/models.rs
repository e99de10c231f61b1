//! Model selection: identifier resolution and default-pointer healing.

pub mod healer;
pub mod resolver;

pub use healer::{default_state, heal_default_model, DefaultState, HealError, HealOutcome};
pub use resolver::{MatchKind, ModelResolver, Resolution};
