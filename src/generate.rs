//! Generation orchestrator.
//!
//! One invocation runs start to finish in a single sequential flow:
//!
//! ```text
//! resolve -> (heal -> resolve) -> read diff -> build -> confirm
//!         -> call with retries -> (truncate -> confirm -> one more call)
//!         -> display, usage, clipboard, record
//! ```
//!
//! Side effects after a successful call are best-effort and never turn a
//! generated message into a failure.

use std::io::Write;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::error::describe_overflow;
use crate::ai::prompts::{self, clean_message, user_prompt, user_prompt_overhead};
use crate::ai::token_budget::{
    context_window, diff_char_budget, estimate_tokens, estimate_tokens_from_char_count,
    RequestEstimate,
};
use crate::ai::{AiError, ChatRequest, Completion, OpenAiClient, TokenUsage};
use crate::config::{ConfigStore, ModelConfig, Settings, UsageRecord};
use crate::git::{truncate_diff, RepositoryReader};
use crate::models::{
    default_state, heal_default_model, DefaultState, HealError, HealOutcome, ModelResolver,
    Resolution,
};
use crate::utils::clipboard::Clipboard;
use crate::utils::credentials::{candidate_env_vars, process_env, resolve_api_key_with};
use crate::utils::interaction::Interaction;

/// Per-invocation options from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Explicit model identifier; `None` means the default model.
    pub model: Option<String>,
    /// Extra instruction for the model.
    pub instruction: Option<String>,
    /// Show the estimate and stop before calling the model.
    pub dry_run: bool,
    /// Copy the message to the clipboard.
    pub copy: bool,
    /// Print token usage and cost.
    pub show_usage: bool,
}

/// A generated commit message with its accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMessage {
    /// The cleaned commit message.
    pub message: String,
    /// Model that produced it.
    pub model_id: String,
    /// Model name.
    pub model_name: String,
    /// Usage reported by the endpoint.
    pub usage: Option<TokenUsage>,
    /// Estimate for the request that succeeded.
    pub estimate: RequestEstimate,
    /// Files omitted when the diff had to be truncated.
    pub omitted_files: Option<usize>,
}

/// How an invocation ended without error. All map to exit code 0.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    /// The working tree has no changes.
    NoChanges,
    /// Dry run: the estimate was shown and nothing was sent.
    Preview(RequestEstimate),
    /// The user declined the confirmation.
    Cancelled,
    /// A message was generated.
    Generated(GeneratedMessage),
}

/// Terminal failures of one invocation. All map to exit code 1.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The identifier matched nothing. There is no fallback to the default.
    #[error("Model '{identifier}' not found{}", available_suffix(.available))]
    NotFound {
        /// What the user typed.
        identifier: String,
        /// Summaries of every stored model.
        available: Vec<String>,
    },

    /// The identifier is a prefix of several models.
    #[error("'{identifier}' matches several models:{}\nUse the full name or an alias", bulleted(.candidates))]
    Ambiguous {
        /// What the user typed.
        identifier: String,
        /// Summaries of the matching models.
        candidates: Vec<String>,
    },

    /// Nothing to resolve against.
    #[error("No models configured. Add one with `diffscribe models add <name> --url <url>`")]
    NoModels,

    /// The default model could not be repaired.
    #[error("Could not determine a default model: {0}")]
    HealingFailed(String),

    /// The working directory is not inside a git repository.
    #[error("Not in a git repository")]
    NotARepository,

    /// The model needs a key and none was found.
    #[error("No API key for model '{model}'. Pass `--api-key` to `diffscribe models add` or set {}", either(.env_vars))]
    MissingApiKey {
        /// Model name.
        model: String,
        /// Variables that were consulted.
        env_vars: Vec<String>,
    },

    /// The endpoint rejected the key.
    #[error("Authentication failed for model '{model}': {message}\nCheck the stored key with `diffscribe models show {model}` or set {}", either(.env_vars))]
    AuthenticationFailed {
        /// Model name.
        model: String,
        /// Error reported by the endpoint.
        message: String,
        /// Variables that are consulted for keys.
        env_vars: Vec<String>,
    },

    /// The truncated diff still overflowed the context window.
    #[error("The diff is still too large for the model context after truncation{}", describe_overflow(.max_context, .requested_tokens))]
    ContextStillTooLong {
        /// Window reported on the second overflow.
        max_context: Option<usize>,
        /// Tokens requested on the second overflow.
        requested_tokens: Option<usize>,
    },

    /// Any other call failure, retries included.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Unexpected failure in a collaborator.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl GenerateError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        1
    }
}

fn available_suffix(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(". Available models:{}", bulleted(available))
    }
}

fn bulleted(items: &[String]) -> String {
    items.iter().map(|item| format!("\n  {item}")).collect()
}

fn either(items: &[String]) -> String {
    items.join(" or ")
}

type EnvLookup<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

/// Runs one generation against its collaborators.
pub struct Generator<'a> {
    store: &'a dyn ConfigStore,
    repository: &'a dyn RepositoryReader,
    client: OpenAiClient,
    interaction: &'a mut dyn Interaction,
    clipboard: Option<&'a mut dyn Clipboard>,
    output: &'a mut (dyn Write + Send),
    status: &'a mut (dyn Write + Send),
    env: EnvLookup<'a>,
}

impl<'a> Generator<'a> {
    /// Creates a generator.
    ///
    /// The message is written to `output`; estimates, usage and notices go
    /// to `status`.
    pub fn new(
        store: &'a dyn ConfigStore,
        repository: &'a dyn RepositoryReader,
        client: OpenAiClient,
        interaction: &'a mut dyn Interaction,
        output: &'a mut (dyn Write + Send),
        status: &'a mut (dyn Write + Send),
    ) -> Self {
        Self {
            store,
            repository,
            client,
            interaction,
            clipboard: None,
            output,
            status,
            env: &process_env,
        }
    }

    /// Enables copying to `clipboard` when requested.
    #[must_use]
    pub fn with_clipboard(mut self, clipboard: &'a mut dyn Clipboard) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Replaces the environment lookup used for API keys.
    #[must_use]
    pub fn with_env(mut self, env: EnvLookup<'a>) -> Self {
        self.env = env;
        self
    }

    /// Runs the whole pipeline once.
    pub async fn run(&mut self, options: &GenerateOptions) -> Result<GenerateOutcome, GenerateError> {
        if !self.repository.is_repository()? {
            return Err(GenerateError::NotARepository);
        }

        let settings = self.store.load_settings()?;
        let (settings, model) = self.resolve_model(settings, options.model.as_deref())?;
        info!(model = %model.name, "Using model");

        let diff = self.repository.get_diff()?;
        if diff.trim().is_empty() {
            self.notice("No changes to commit.");
            return Ok(GenerateOutcome::NoChanges);
        }

        let instruction = options.instruction.as_deref();
        let system = prompts::system_prompt(&model);
        let user = user_prompt(&diff, instruction, None);
        let estimate = RequestEstimate::for_prompts(&model, system, &user);
        debug!(
            diff_len = diff.len(),
            prompt_tokens = estimate.prompt_tokens,
            context_length = estimate.context_length,
            "Built generation request"
        );

        if options.dry_run {
            self.notice(&format_breakdown(&model, diff.len(), &estimate, None));
            return Ok(GenerateOutcome::Preview(estimate));
        }

        let api_key = self.api_key(&model)?;

        if settings.require_confirmation {
            let breakdown = format_breakdown(&model, diff.len(), &estimate, None);
            if !self.interaction.confirm(&breakdown)? {
                self.notice("Cancelled.");
                return Ok(GenerateOutcome::Cancelled);
            }
        }

        let chat = ChatRequest {
            model: &model,
            api_key: api_key.as_deref(),
            system_prompt: system,
            user_prompt: &user,
        };
        let first = self.client.complete(&chat).await;

        let (completion, estimate, omitted_files) = match first {
            Ok(completion) => (completion, estimate, None),
            Err(AiError::ContextLengthExceeded {
                max_context,
                requested_tokens,
            }) => {
                warn!(
                    ?max_context,
                    ?requested_tokens,
                    "Context length exceeded; truncating diff and retrying once"
                );
                let scaffold_tokens = estimate_tokens(system)
                    + estimate_tokens_from_char_count(user_prompt_overhead(instruction, true));
                let budget = diff_char_budget(&model, max_context, scaffold_tokens);
                let truncated = truncate_diff(&diff, budget);
                let user = user_prompt(&truncated.text, instruction, Some(truncated.omitted_files));
                let estimate = RequestEstimate::for_prompts_in_window(
                    &model,
                    context_window(&model, max_context),
                    system,
                    &user,
                );
                info!(
                    budget_chars = budget,
                    omitted_files = truncated.omitted_files,
                    "Retrying with truncated diff"
                );

                let notice = format!(
                    "The diff exceeds the model context; sending a truncated version ({} of {} chars, {} file(s) omitted).",
                    truncated.text.len(),
                    diff.len(),
                    truncated.omitted_files
                );
                if settings.require_confirmation {
                    let breakdown = format_breakdown(
                        &model,
                        truncated.text.len(),
                        &estimate,
                        Some(truncated.omitted_files),
                    );
                    if !self.interaction.confirm(&format!("{notice}\n{breakdown}"))? {
                        self.notice("Cancelled.");
                        return Ok(GenerateOutcome::Cancelled);
                    }
                } else {
                    self.notice(&notice);
                }

                let chat = ChatRequest {
                    user_prompt: &user,
                    ..chat
                };
                match self.client.complete(&chat).await {
                    Ok(completion) => (completion, estimate, Some(truncated.omitted_files)),
                    Err(AiError::ContextLengthExceeded {
                        max_context,
                        requested_tokens,
                    }) => {
                        return Err(GenerateError::ContextStillTooLong {
                            max_context,
                            requested_tokens,
                        })
                    }
                    Err(e) => return Err(self.call_error(&model, e)),
                }
            }
            Err(e) => return Err(self.call_error(&model, e)),
        };

        let generated = self.finish(&settings, &model, options, completion, estimate, omitted_files);
        Ok(GenerateOutcome::Generated(generated))
    }

    /// Resolves the model to use, healing the default pointer if needed.
    ///
    /// Returns the snapshot the model came from, which may be a healed one.
    fn resolve_model(
        &mut self,
        settings: Settings,
        identifier: Option<&str>,
    ) -> Result<(Settings, ModelConfig), GenerateError> {
        if settings.models.is_empty() {
            return Err(GenerateError::NoModels);
        }

        if let Some(identifier) = identifier {
            let model = resolve_identifier(&settings, identifier)?;
            return Ok((settings, model));
        }

        if default_state(&settings) == DefaultState::Valid {
            if let Some(model) = settings
                .default_model_id()
                .and_then(|id| settings.model_by_id(id))
                .cloned()
            {
                return Ok((settings, model));
            }
        }

        let healed = match heal_default_model(&settings, &mut *self.interaction) {
            Ok(HealOutcome::Healed {
                settings: healed,
                model_id,
                automatic,
            }) => {
                self.store.save_settings(&healed)?;
                if automatic {
                    self.notice(&format!(
                        "Default model set to '{}'.",
                        healed.model_by_id(&model_id).map_or("?", |m| m.name.as_str())
                    ));
                }
                healed
            }
            Ok(HealOutcome::AlreadyValid) => settings,
            Ok(HealOutcome::NothingToHeal) => return Err(GenerateError::NoModels),
            Err(HealError::NoSelection { candidates }) => {
                return Err(GenerateError::HealingFailed(
                    HealError::NoSelection { candidates }.to_string(),
                ))
            }
            Err(HealError::Interaction(e)) => return Err(GenerateError::Fatal(e)),
        };

        // Fresh resolution against the healed snapshot.
        let model = healed
            .default_model_id()
            .and_then(|id| healed.model_by_id(id))
            .cloned()
            .ok_or_else(|| {
                GenerateError::HealingFailed("default model is still unresolved".to_string())
            })?;
        Ok((healed, model))
    }

    fn api_key(&self, model: &ModelConfig) -> Result<Option<String>, GenerateError> {
        let key = resolve_api_key_with(model, self.env);
        if model.requires_auth && key.is_none() {
            return Err(GenerateError::MissingApiKey {
                model: model.name.clone(),
                env_vars: env_var_names(model),
            });
        }
        Ok(key)
    }

    fn call_error(&self, model: &ModelConfig, error: AiError) -> GenerateError {
        match error {
            AiError::AuthenticationFailed { message, .. } => GenerateError::AuthenticationFailed {
                model: model.name.clone(),
                message,
                env_vars: env_var_names(model),
            },
            other => GenerateError::Ai(other),
        }
    }

    /// Display, usage, clipboard, record. Failures are logged only.
    fn finish(
        &mut self,
        settings: &Settings,
        model: &ModelConfig,
        options: &GenerateOptions,
        completion: Completion,
        estimate: RequestEstimate,
        omitted_files: Option<usize>,
    ) -> GeneratedMessage {
        let message = clean_message(&completion.text);

        if let Err(e) = writeln!(self.output, "{message}").and_then(|()| self.output.flush()) {
            warn!(error = %e, "Failed to write commit message");
        }

        let prompt_tokens = completion
            .usage
            .map_or(estimate.prompt_tokens, |u| u.prompt_tokens);
        let completion_tokens = completion
            .usage
            .map_or_else(|| estimate_tokens(&message), |u| u.completion_tokens);
        let cost = model
            .pricing
            .as_ref()
            .map(|p| p.cost(prompt_tokens, completion_tokens));

        if options.show_usage || settings.show_usage {
            let source = if completion.usage.is_some() {
                "reported"
            } else {
                "estimated"
            };
            let mut line = format!(
                "Tokens ({source}): {prompt_tokens} prompt + {completion_tokens} completion"
            );
            if let Some(cost) = cost {
                line.push_str(&format!(", cost ${cost:.6}"));
            }
            self.notice(&line);
        }

        if options.copy || settings.copy_to_clipboard {
            let copied = self.clipboard.as_mut().map(|c| c.set_text(&message));
            match copied {
                Some(Ok(())) => self.notice("Copied to clipboard."),
                Some(Err(e)) => {
                    warn!(error = %e, "Clipboard copy failed");
                    self.notice(&format!("warning: {e:#}"));
                }
                None => debug!("No clipboard available"),
            }
        }

        let now = Utc::now();
        if let Err(e) = self.store.touch_last_used(&model.id, now) {
            warn!(error = %e, model = %model.name, "Failed to update last-used time");
        }
        let record = UsageRecord {
            timestamp: now,
            model_id: model.id.clone(),
            model_name: model.name.clone(),
            prompt_tokens,
            completion_tokens,
            cost,
            truncated: omitted_files.is_some(),
        };
        if let Err(e) = self.store.record_usage(&record) {
            warn!(error = %e, "Failed to record usage");
        }

        GeneratedMessage {
            message,
            model_id: model.id.clone(),
            model_name: model.name.clone(),
            usage: completion.usage,
            estimate,
            omitted_files,
        }
    }

    fn notice(&mut self, text: &str) {
        if let Err(e) = writeln!(self.status, "{text}") {
            warn!(error = %e, "Failed to write status output");
        }
    }
}

/// Resolves an explicit identifier. Never falls back to the default.
pub(crate) fn resolve_identifier(
    settings: &Settings,
    identifier: &str,
) -> Result<ModelConfig, GenerateError> {
    match ModelResolver::new(settings).resolve(identifier) {
        Resolution::Found(model, kind) => {
            debug!(?kind, model = %model.name, "Resolved explicit model");
            Ok(model.clone())
        }
        Resolution::Ambiguous(candidates) => Err(GenerateError::Ambiguous {
            identifier: identifier.to_string(),
            candidates: candidates.iter().map(|m| m.summary()).collect(),
        }),
        Resolution::NotFound => Err(GenerateError::NotFound {
            identifier: identifier.to_string(),
            available: settings.models.iter().map(ModelConfig::summary).collect(),
        }),
    }
}

fn env_var_names(model: &ModelConfig) -> Vec<String> {
    candidate_env_vars(model)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Human-readable estimate shown before sending.
#[must_use]
pub fn format_breakdown(
    model: &ModelConfig,
    diff_chars: usize,
    estimate: &RequestEstimate,
    omitted_files: Option<usize>,
) -> String {
    let mut text = format!(
        "Model:           {}\n\
         Diff size:       {diff_chars} chars\n\
         Prompt tokens:   ~{}\n\
         Max output:      {} tokens\n\
         Context length:  {} tokens ({:.1}% used)",
        model.summary(),
        estimate.prompt_tokens,
        estimate.max_output_tokens,
        estimate.context_length,
        estimate.utilization_pct(),
    );
    if let Some(omitted) = omitted_files {
        text.push_str(&format!("\nOmitted files:   {omitted}"));
    }
    if let Some(cost) = estimate.estimated_cost {
        text.push_str(&format!("\nEstimated cost:  up to ${cost:.6}"));
    }
    if estimate.exceeds_context() {
        text.push_str("\nwarning: the request likely exceeds the context window");
    }
    text
}
