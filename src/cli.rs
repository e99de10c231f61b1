//! CLI interface for diffscribe.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod config;
pub mod generate;
pub mod models;

/// diffscribe: commit messages for uncommitted changes, from any
/// OpenAI-compatible model.
#[derive(Parser)]
#[command(name = "diffscribe")]
#[command(
    about = "Generate a commit message for uncommitted changes",
    long_about = None
)]
#[command(version, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Management subcommand; omit to generate a message.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Generation options.
    #[command(flatten)]
    pub generate: generate::GenerateArgs,
}

/// Management commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage stored models.
    Models(models::ModelsCommand),
    /// Show or change application settings.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Some(Commands::Models(models_cmd)) => models_cmd.execute(),
            Some(Commands::Config(config_cmd)) => config_cmd.execute(),
            None => self.generate.execute().await,
        }
    }
}
