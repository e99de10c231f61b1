//! The default command: generate a commit message.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use crate::ai::{OpenAiClient, ReqwestTransport, RetryPolicy};
use crate::config::JsonFileStore;
use crate::generate::{GenerateOptions, Generator};
use crate::git::GitRepository;
use crate::utils::clipboard::SystemClipboard;
use crate::utils::interaction::ConsoleInteraction;

/// Options for generating a message.
#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {
    /// Model name, alias (with or without @) or unique prefix.
    #[arg(value_name = "MODEL", conflicts_with = "model_flag")]
    pub model: Option<String>,

    /// Model to use, as an alternative to the positional argument.
    #[arg(short = 'm', long = "model", id = "model_flag", value_name = "MODEL")]
    pub model_flag: Option<String>,

    /// Extra instruction for the model.
    #[arg(short = 'i', long)]
    pub instruction: Option<String>,

    /// Show the token and cost estimate without calling the model.
    #[arg(long)]
    pub dry_run: bool,

    /// Copy the generated message to the clipboard.
    #[arg(long)]
    pub copy: bool,

    /// Print token usage and cost after generation.
    #[arg(long)]
    pub usage: bool,
}

impl GenerateArgs {
    /// Converts parsed arguments into orchestrator options.
    #[must_use]
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            model: self.model.clone().or_else(|| self.model_flag.clone()),
            instruction: self.instruction.clone(),
            dry_run: self.dry_run,
            copy: self.copy,
            show_usage: self.usage,
        }
    }

    /// Executes generation against the real store, repository and network.
    pub async fn execute(self) -> Result<()> {
        let store = JsonFileStore::open_default()?;
        let repository = GitRepository::current_dir()?;
        let transport = Arc::new(ReqwestTransport::new()?);
        let client = OpenAiClient::new(transport, RetryPolicy::default());
        let mut interaction = ConsoleInteraction::stdin();
        let mut clipboard = SystemClipboard;
        let mut stdout = std::io::stdout();
        let mut stderr = std::io::stderr();

        let mut generator = Generator::new(
            &store,
            &repository,
            client,
            &mut interaction,
            &mut stdout,
            &mut stderr,
        )
        .with_clipboard(&mut clipboard);

        generator.run(&self.options()).await?;
        Ok(())
    }
}
