//! Prompt templates for commit message generation.

use crate::config::ModelConfig;

/// Default system prompt when the model has none of its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are an expert software engineer writing git commit messages.

You will receive a unified diff of uncommitted changes. Write one commit message that describes what the code changes actually do.

Follow the conventional commit format:

<type>(<scope>): <description>

[optional body]

Types: feat, fix, docs, style, refactor, test, chore, ci, perf, build.

Rules:
- Use the imperative mood (add, not added)
- Use lowercase for the description and no trailing period
- Keep the subject line under 72 characters
- Add a body only when the change needs explanation; wrap it at 72 columns
- Base the message on the + and - lines, not on file names alone

Reply with the commit message only. No preamble, no code fences, no commentary.";

/// Returns the system prompt for `model`.
#[must_use]
pub fn system_prompt(model: &ModelConfig) -> &str {
    match model.system_prompt.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => custom,
        _ => DEFAULT_SYSTEM_PROMPT,
    }
}

/// Builds the user prompt around `diff`.
///
/// `omitted_files` is `Some` when the diff was truncated.
#[must_use]
pub fn user_prompt(diff: &str, instruction: Option<&str>, omitted_files: Option<usize>) -> String {
    let mut prompt = String::new();

    if let Some(instruction) = instruction.map(str::trim).filter(|i| !i.is_empty()) {
        prompt.push_str("Additional instructions:\n");
        prompt.push_str(instruction);
        prompt.push_str("\n\n");
    }

    if let Some(omitted) = omitted_files {
        prompt.push_str(&format!(
            "Note: the diff below was truncated to fit the model context; {omitted} file(s) were omitted entirely. Describe the visible changes and keep the message general where content is missing.\n\n"
        ));
    }

    prompt.push_str("Generate a commit message for this diff:\n\n```diff\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    prompt
}

/// Characters the user prompt adds around the diff itself.
#[must_use]
pub fn user_prompt_overhead(instruction: Option<&str>, truncated: bool) -> usize {
    user_prompt("", instruction, truncated.then_some(usize::MAX)).len() + 1
}

/// Removes code fences and surrounding whitespace some models add anyway.
#[must_use]
pub fn clean_message(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| {
            // Drop an info string such as ```text
            match inner.split_once('\n') {
                Some((first, rest)) if !first.contains(' ') => rest,
                _ => inner,
            }
        })
        .unwrap_or(trimmed);
    unfenced.trim().to_string()
}
