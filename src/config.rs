//! Model configurations, application settings and their persistence.

pub mod error;
pub mod model;
pub mod settings;
pub mod store;

pub use error::ConfigError;
pub use model::{normalize_alias, ModelConfig, Pricing, ProviderType};
pub use settings::Settings;
pub use store::{ConfigStore, JsonFileStore, MemoryStore, UsageRecord};
