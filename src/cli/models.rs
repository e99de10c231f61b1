//! Model management commands.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{ConfigStore, JsonFileStore, ModelConfig, Pricing, ProviderType};
use crate::generate::resolve_identifier;
use crate::utils::credentials::mask_key;

/// Models operations.
#[derive(Parser)]
pub struct ModelsCommand {
    /// Models subcommand to execute.
    #[command(subcommand)]
    pub command: ModelsSubcommands,
}

/// Models subcommands.
#[derive(Subcommand)]
pub enum ModelsSubcommands {
    /// Lists stored models, marking the default.
    List,
    /// Shows one model in detail.
    Show(ModelRef),
    /// Adds a model.
    Add(AddCommand),
    /// Removes a model.
    Remove(ModelRef),
    /// Makes a model the default.
    Default(ModelRef),
    /// Adds an alias to a model.
    Alias(AliasCommand),
    /// Removes an alias from a model.
    Unalias(AliasCommand),
}

/// A model identifier argument.
#[derive(Parser)]
pub struct ModelRef {
    /// Model name, alias or unique prefix.
    pub model: String,
}

/// Alias command options.
#[derive(Parser)]
pub struct AliasCommand {
    /// Model name, alias or unique prefix.
    pub model: String,
    /// Alias, with or without a leading @.
    pub alias: String,
}

/// Add command options.
#[derive(Parser)]
pub struct AddCommand {
    /// Model name, also sent to the API unless --api-model is given.
    pub name: String,

    /// Base URL of the endpoint. Defaults to the provider's usual URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Provider: openai, openrouter, ollama or custom.
    #[arg(long, default_value = "openai")]
    pub provider: ProviderType,

    /// Upstream model identifier when it differs from the name.
    #[arg(long)]
    pub api_model: Option<String>,

    /// Alias for the model; may be repeated.
    #[arg(long = "alias", value_name = "ALIAS")]
    pub aliases: Vec<String>,

    /// API key to store with the model.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Never send an Authorization header.
    #[arg(long)]
    pub no_auth: bool,

    /// Completion allowance in tokens.
    #[arg(long)]
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Send max_tokens instead of max_completion_tokens.
    #[arg(long)]
    pub legacy_max_tokens: bool,

    /// Context window in tokens.
    #[arg(long)]
    pub context_length: Option<usize>,

    /// Prompt price in USD per million tokens.
    #[arg(long, requires = "output_price")]
    pub input_price: Option<f64>,

    /// Completion price in USD per million tokens.
    #[arg(long, requires = "input_price")]
    pub output_price: Option<f64>,

    /// Replaces the built-in system prompt.
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Make this model the default.
    #[arg(long)]
    pub default: bool,
}

impl ModelsCommand {
    /// Executes the models command against the settings file.
    pub fn execute(self) -> Result<()> {
        let store = JsonFileStore::open_default()?;
        self.run(&store, &mut std::io::stdout())
    }

    /// Runs the command against `store`, writing to `out`.
    pub fn run(self, store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
        match self.command {
            ModelsSubcommands::List => list(store, out),
            ModelsSubcommands::Show(target) => show(store, &target.model, out),
            ModelsSubcommands::Add(add_cmd) => add_cmd.run(store, out),
            ModelsSubcommands::Remove(target) => remove(store, &target.model, out),
            ModelsSubcommands::Default(target) => set_default(store, &target.model, out),
            ModelsSubcommands::Alias(cmd) => alias(store, cmd, out),
            ModelsSubcommands::Unalias(cmd) => unalias(store, cmd, out),
        }
    }
}

fn resolve(store: &dyn ConfigStore, identifier: &str) -> Result<ModelConfig> {
    let settings = store.load_settings()?;
    Ok(resolve_identifier(&settings, identifier)?)
}

fn list(store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
    let settings = store.load_settings()?;
    if settings.models.is_empty() {
        writeln!(out, "No models configured. Add one with 'diffscribe models add <NAME>'.")?;
        return Ok(());
    }
    let default_id = settings.default_model_id();
    for model in &settings.models {
        let marker = if Some(model.id.as_str()) == default_id { "*" } else { " " };
        writeln!(out, "{marker} {}", model.summary())?;
    }
    Ok(())
}

fn show(store: &dyn ConfigStore, identifier: &str, out: &mut dyn Write) -> Result<()> {
    let settings = store.load_settings()?;
    let model = resolve_identifier(&settings, identifier)?;
    let is_default = settings.default_model_id() == Some(model.id.as_str());

    writeln!(out, "Name:              {}", model.name)?;
    writeln!(out, "Id:                {}", model.id)?;
    writeln!(out, "Provider:          {}", model.provider)?;
    writeln!(out, "URL:               {}", model.url)?;
    if model.api_model.is_some() {
        writeln!(out, "API model:         {}", model.api_model())?;
    }
    if !model.aliases.is_empty() {
        writeln!(out, "Aliases:           {}", model.display_aliases())?;
    }
    let key = match (&model.api_key, model.requires_auth) {
        (_, false) => "not required".to_string(),
        (Some(key), true) => mask_key(key),
        (None, true) => "from environment".to_string(),
    };
    writeln!(out, "API key:           {key}")?;
    writeln!(out, "Max output tokens: {}", model.max_output_tokens)?;
    writeln!(out, "Temperature:       {}", model.temperature)?;
    if model.use_legacy_max_tokens {
        writeln!(out, "Token parameter:   max_tokens")?;
    }
    if let Some(context) = model.context_length {
        writeln!(out, "Context length:    {context}")?;
    }
    if let Some(pricing) = &model.pricing {
        writeln!(
            out,
            "Pricing:           ${:.2} in / ${:.2} out per 1M tokens",
            pricing.input_per_million, pricing.output_per_million
        )?;
    }
    if model.system_prompt.is_some() {
        writeln!(out, "System prompt:     custom")?;
    }
    if let Some(last_used) = model.last_used {
        writeln!(out, "Last used:         {}", last_used.format("%Y-%m-%d %H:%M UTC"))?;
    }
    if is_default {
        writeln!(out, "Default:           yes")?;
    }
    Ok(())
}

impl AddCommand {
    fn into_model(self) -> Result<ModelConfig> {
        let url = self
            .url
            .unwrap_or_else(|| self.provider.default_url().to_string());
        let parsed = url::Url::parse(url.trim()).with_context(|| format!("Invalid URL '{url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Invalid URL '{url}': expected http or https");
        }
        let mut model = ModelConfig::new(self.name.trim(), url);
        model.provider = self.provider;
        model.api_model = self.api_model;
        model.aliases = self.aliases;
        model.api_key = self.api_key;
        model.requires_auth = !self.no_auth && self.provider.requires_auth_by_default();
        if let Some(max) = self.max_output_tokens {
            model.max_output_tokens = max;
        }
        if let Some(temperature) = self.temperature {
            model.temperature = temperature;
        }
        model.use_legacy_max_tokens = self.legacy_max_tokens;
        model.context_length = self.context_length;
        model.pricing = self
            .input_price
            .zip(self.output_price)
            .map(|(input, output)| Pricing {
                input_per_million: input,
                output_per_million: output,
            });
        model.system_prompt = self.system_prompt;
        Ok(model)
    }

    fn run(self, store: &dyn ConfigStore, out: &mut dyn Write) -> Result<()> {
        let make_default = self.default;
        let model = self.into_model()?;
        let (id, name) = (model.id.clone(), model.name.clone());

        let mut settings = store.add_model(model)?;
        if make_default && settings.default_model_id() != Some(id.as_str()) {
            settings = settings.with_default_model(&id)?;
            store.save_settings(&settings)?;
        }

        writeln!(out, "Added model '{name}'.")?;
        if settings.default_model_id() == Some(id.as_str()) {
            writeln!(out, "'{name}' is the default model.")?;
        }
        Ok(())
    }
}

fn remove(store: &dyn ConfigStore, identifier: &str, out: &mut dyn Write) -> Result<()> {
    let model = resolve(store, identifier)?;
    let settings = store.delete_model(&model.id)?;
    writeln!(out, "Removed model '{}'.", model.name)?;
    if settings.default_model_id().is_none() && !settings.models.is_empty() {
        writeln!(
            out,
            "No default model is set; one will be chosen on the next run."
        )?;
    }
    Ok(())
}

fn set_default(store: &dyn ConfigStore, identifier: &str, out: &mut dyn Write) -> Result<()> {
    let model = resolve(store, identifier)?;
    let settings = store.load_settings()?.with_default_model(&model.id)?;
    store.save_settings(&settings)?;
    writeln!(out, "Default model set to '{}'.", model.name)?;
    Ok(())
}

fn alias(store: &dyn ConfigStore, cmd: AliasCommand, out: &mut dyn Write) -> Result<()> {
    let mut model = resolve(store, &cmd.model)?;
    model.aliases.push(cmd.alias.trim().to_string());
    store.update_model(model.clone())?;
    writeln!(
        out,
        "Model '{}' now answers to {}.",
        model.name,
        model.display_aliases()
    )?;
    Ok(())
}

fn unalias(store: &dyn ConfigStore, cmd: AliasCommand, out: &mut dyn Write) -> Result<()> {
    let mut model = resolve(store, &cmd.model)?;
    let target = crate::config::normalize_alias(&cmd.alias);
    let before = model.aliases.len();
    model
        .aliases
        .retain(|a| crate::config::normalize_alias(a) != target);
    if model.aliases.len() == before {
        bail!("Model '{}' has no alias '@{target}'", model.name);
    }
    store.update_model(model.clone())?;
    writeln!(out, "Removed alias '@{target}' from '{}'.", model.name)?;
    Ok(())
}
