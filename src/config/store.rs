//! Settings persistence.
//!
//! [`ConfigStore`] is the seam between the generation pipeline and wherever
//! settings live. Implementations only provide load and save; the model CRUD
//! operations are built on top and always validate the new snapshot before
//! it is written.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::ModelConfig;
use super::settings::Settings;

/// Directory name under `$HOME` holding settings and the usage log.
const CONFIG_DIR_NAME: &str = ".diffscribe";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DIFFSCRIBE_CONFIG_DIR";

const SETTINGS_FILE: &str = "settings.json";
const USAGE_FILE: &str = "usage.jsonl";

/// One completed generation, appended to the usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// When the generation finished.
    pub timestamp: DateTime<Utc>,
    /// Id of the model used.
    pub model_id: String,
    /// Name of the model used.
    pub model_name: String,
    /// Prompt tokens, as reported by the provider or estimated.
    pub prompt_tokens: usize,
    /// Completion tokens, as reported by the provider or estimated.
    pub completion_tokens: usize,
    /// Cost in USD when pricing is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Whether the diff had to be truncated.
    #[serde(default)]
    pub truncated: bool,
}

/// Load/save access to the settings snapshot.
///
/// Loads must reflect the most recent save, and saves must be atomic.
pub trait ConfigStore: Send + Sync {
    /// Loads the current settings snapshot.
    fn load_settings(&self) -> Result<Settings>;

    /// Persists `settings`, replacing the previous snapshot.
    fn save_settings(&self, settings: &Settings) -> Result<()>;

    /// Appends a usage record. The default implementation discards it.
    fn record_usage(&self, _record: &UsageRecord) -> Result<()> {
        Ok(())
    }

    /// Adds a model and returns the saved snapshot.
    fn add_model(&self, model: ModelConfig) -> Result<Settings> {
        let next = self.load_settings()?.with_model_added(model)?;
        self.save_settings(&next)?;
        Ok(next)
    }

    /// Replaces the model with the same id and returns the saved snapshot.
    fn update_model(&self, model: ModelConfig) -> Result<Settings> {
        let next = self.load_settings()?.with_model_updated(model)?;
        self.save_settings(&next)?;
        Ok(next)
    }

    /// Deletes a model by id and returns the saved snapshot.
    fn delete_model(&self, id: &str) -> Result<Settings> {
        let next = self.load_settings()?.with_model_deleted(id)?;
        self.save_settings(&next)?;
        Ok(next)
    }

    /// Lists stored models in creation order.
    fn list_models(&self) -> Result<Vec<ModelConfig>> {
        Ok(self.load_settings()?.models)
    }

    /// Finds a model by id or case-insensitive name.
    fn get_model_by_id_or_name(&self, key: &str) -> Result<Option<ModelConfig>> {
        Ok(self.load_settings()?.model_by_id_or_name(key).cloned())
    }

    /// Stamps `last_used` on a model and returns the saved snapshot.
    fn touch_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<Settings> {
        let settings = self.load_settings()?;
        let mut model = settings
            .model_by_id(id)
            .cloned()
            .ok_or_else(|| anyhow!("No model with id '{id}'"))?;
        model.last_used = Some(at);
        self.update_model(model)
    }
}

/// JSON file store under `$HOME/.diffscribe/`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens the store at the default location.
    ///
    /// Honours `DIFFSCRIBE_CONFIG_DIR` when set.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_dir()?))
    }

    /// Opens a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the default configuration directory.
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Path of the settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Path of the usage log.
    pub fn usage_path(&self) -> PathBuf {
        self.dir.join(USAGE_FILE)
    }

    fn ensure_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!(
                "Failed to create configuration directory: {}",
                self.dir.display()
            )
        })?;
        Ok(&self.dir)
    }
}

impl ConfigStore for JsonFileStore {
    fn load_settings(&self) -> Result<Settings> {
        let path = self.settings_path();
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let dir = self.ensure_dir()?;
        let path = self.settings_path();

        let json =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary settings file")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write temporary settings file")?;
        tmp.as_file()
            .sync_all()
            .context("Failed to flush temporary settings file")?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to replace settings file: {}", path.display()))?;

        debug!(path = %path.display(), models = settings.models.len(), "Saved settings");
        Ok(())
    }

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        self.ensure_dir()?;
        let path = self.usage_path();
        let line = serde_json::to_string(record).context("Failed to serialize usage record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open usage log: {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append usage log: {}", path.display()))
    }
}

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
    usage: Mutex<Vec<UsageRecord>>,
}

impl MemoryStore {
    /// Creates a store holding `settings`.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            usage: Mutex::new(Vec::new()),
        }
    }

    /// Returns every recorded usage entry.
    pub fn usage(&self) -> Vec<UsageRecord> {
        self.usage
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl ConfigStore for MemoryStore {
    fn load_settings(&self) -> Result<Settings> {
        self.settings
            .lock()
            .map(|s| s.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = settings.clone();
        Ok(())
    }

    fn record_usage(&self, record: &UsageRecord) -> Result<()> {
        self.usage
            .lock()
            .map_err(|_| anyhow!("usage lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
