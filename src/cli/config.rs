//! Configuration-related CLI commands.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{ConfigStore, JsonFileStore, Settings};
use crate::utils::credentials::mask_key;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Prints the current settings as YAML, with API keys masked.
    Show,
    /// Changes one application setting.
    Set(SetCommand),
    /// Prints the settings file location.
    Path,
}

/// Set command options.
#[derive(Parser)]
pub struct SetCommand {
    /// Setting name: partialMatchEnabled, minPartialMatchLength,
    /// requireConfirmation, copyToClipboard or showUsage.
    pub key: String,
    /// New value.
    pub value: String,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        let store = JsonFileStore::open_default()?;
        if matches!(self.command, ConfigSubcommands::Path) {
            println!("{}", store.settings_path().display());
            return Ok(());
        }
        self.run(&store, &mut std::io::stdout())
    }

    /// Runs the command against `store`, writing to `out`.
    pub fn run(self, store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show => show(store, out),
            ConfigSubcommands::Set(set_cmd) => set_cmd.run(store, out),
            ConfigSubcommands::Path => bail!("The settings path is only known for the file store"),
        }
    }
}

fn show(store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
    let mut settings = store.load_settings()?;
    for model in &mut settings.models {
        model.api_key = model.api_key.as_deref().map(mask_key);
    }
    let yaml = serde_yaml::to_string(&settings).context("Failed to render settings")?;
    write!(out, "{yaml}")?;
    Ok(())
}

impl SetCommand {
    fn run(self, store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
        let settings = apply_setting(store.load_settings()?, &self.key, &self.value)?;
        store.save_settings(&settings)?;
        writeln!(out, "{} = {}", self.key, self.value.trim())?;
        Ok(())
    }
}

fn apply_setting(mut settings: Settings, key: &str, value: &str) -> Result<Settings> {
    let value = value.trim();
    let flag = || parse_bool(value).with_context(|| format!("'{key}' expects true or false"));
    match key {
        "partialMatchEnabled" => settings.partial_match_enabled = flag()?,
        "requireConfirmation" => settings.require_confirmation = flag()?,
        "copyToClipboard" => settings.copy_to_clipboard = flag()?,
        "showUsage" => settings.show_usage = flag()?,
        "minPartialMatchLength" => {
            settings.min_partial_match_length = value
                .parse()
                .with_context(|| format!("'{key}' expects a non-negative integer"))?;
        }
        other => bail!(
            "Unknown setting '{other}'. Known settings: partialMatchEnabled, \
             minPartialMatchLength, requireConfirmation, copyToClipboard, showUsage"
        ),
    }
    Ok(settings)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("invalid boolean '{value}'"),
    }
}
