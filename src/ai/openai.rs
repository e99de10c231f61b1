//! OpenAI-compatible chat completions client (OpenAI, OpenRouter, Ollama, etc.)

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::error::AiError;
use crate::ai::retry::RetryPolicy;
use crate::ai::transport::{HttpRequest, HttpResponse, Transport};
use crate::config::ModelConfig;

/// OpenAI API request message
#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI API request body
#[derive(Serialize, Debug)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    temperature: f32,
    stream: bool,
}

/// OpenAI API response choice
#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

/// OpenAI API response message
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI API response
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<TokenUsage>,
}

/// Error envelope used by OpenAI-compatible servers.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Token usage reported by the endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens billed.
    #[serde(default)]
    pub prompt_tokens: usize,
    /// Completion tokens billed.
    #[serde(default)]
    pub completion_tokens: usize,
}

/// A generated completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Trimmed text of the first choice.
    pub text: String,
    /// Usage, when the endpoint reported it.
    pub usage: Option<TokenUsage>,
}

/// Everything needed to build one chat request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Model configuration.
    pub model: &'a ModelConfig,
    /// Bearer token, if any.
    pub api_key: Option<&'a str>,
    /// System prompt.
    pub system_prompt: &'a str,
    /// User prompt.
    pub user_prompt: &'a str,
}

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static MAX_CONTEXT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:maximum context length is|context (?:length|window) of|limit of|> ?)\s*(\d+)").unwrap()
});

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static REQUESTED_TOKENS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:requested|resulted in|prompt (?:is|has)|too long:)\s*(?:about\s*)?(\d+)\s*tokens").unwrap()
});

/// Builds the chat completions URL for a base URL.
///
/// A URL already ending in `/chat/completions` is used as is; one ending in
/// `/v1` gets the path appended without repeating the version.
#[must_use]
pub fn completions_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Builds the HTTP request for `chat`.
pub fn build_request(chat: &ChatRequest<'_>) -> Result<HttpRequest, AiError> {
    let model = chat.model;
    let mut messages = Vec::with_capacity(2);
    if !chat.system_prompt.is_empty() {
        messages.push(Message {
            role: "system",
            content: chat.system_prompt,
        });
    }
    messages.push(Message {
        role: "user",
        content: chat.user_prompt,
    });

    let (max_tokens, max_completion_tokens) = if model.use_legacy_max_tokens {
        (Some(model.max_output_tokens), None)
    } else {
        (None, Some(model.max_output_tokens))
    };

    let body = OpenAiRequest {
        model: model.api_model(),
        messages,
        max_tokens,
        max_completion_tokens,
        temperature: model.temperature,
        stream: false,
    };
    let body = serde_json::to_string(&body)
        .map_err(|e| AiError::Fatal(format!("Failed to serialize request: {e}")))?;

    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if model.requires_auth {
        if let Some(key) = chat.api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {key}")));
        }
    }

    let url = completions_url(&model.url);
    debug!(
        url = %url,
        body_len = body.len(),
        legacy_max_tokens = model.use_legacy_max_tokens,
        max_output_tokens = model.max_output_tokens,
        "Built OpenAI-compatible request payload"
    );

    Ok(HttpRequest { url, headers, body })
}

/// Maps a final response to a completion or a typed error.
pub fn interpret_response(response: &HttpResponse) -> Result<Completion, AiError> {
    if !response.is_success() {
        return Err(interpret_error(response));
    }

    let parsed: OpenAiResponse = serde_json::from_str(&response.body)
        .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

    debug!(
        choice_count = parsed.choices.len(),
        model = ?parsed.model,
        usage = ?parsed.usage,
        "Received OpenAI-compatible API response"
    );

    let text = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::InvalidResponse("No choices in response".to_string()))?
        .message
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AiError::InvalidResponse("Empty message content".to_string()))?;

    debug!(response_len = text.len(), "Extracted completion text");
    Ok(Completion {
        text,
        usage: parsed.usage,
    })
}

fn interpret_error(response: &HttpResponse) -> AiError {
    let status = response.status;
    let envelope = serde_json::from_str::<ErrorEnvelope>(&response.body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| response.body.trim().to_string());

    match status {
        401 | 403 => AiError::AuthenticationFailed { status, message },
        400 | 413 => {
            let code = envelope
                .as_ref()
                .and_then(|e| e.error.code.as_ref())
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if code == "context_length_exceeded" || mentions_context_overflow(&message) {
                let (max_context, requested_tokens) = parse_overflow_numbers(&message);
                AiError::ContextLengthExceeded {
                    max_context,
                    requested_tokens,
                }
            } else {
                AiError::ApiRequestFailed { status, message }
            }
        }
        _ => AiError::ApiRequestFailed { status, message },
    }
}

fn mentions_context_overflow(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("context length")
        || lower.contains("context_length")
        || lower.contains("context window")
        || lower.contains("maximum context")
        || lower.contains("prompt is too long")
        || (lower.contains("token") && lower.contains("limit"))
}

/// Extracts `(max_context, requested_tokens)` from an overflow message.
#[must_use]
pub fn parse_overflow_numbers(message: &str) -> (Option<usize>, Option<usize>) {
    let capture = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    };
    (
        capture(&MAX_CONTEXT_PATTERN),
        capture(&REQUESTED_TOKENS_PATTERN),
    )
}

/// Chat client that sends through a [`Transport`] with retries.
#[derive(Clone)]
pub struct OpenAiClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Creates a client.
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Sends one logical completion call.
    pub async fn complete(&self, chat: &ChatRequest<'_>) -> Result<Completion, AiError> {
        let request = build_request(chat)?;
        info!(
            url = %request.url,
            model = %chat.model.name,
            "Sending request to OpenAI-compatible API"
        );
        let response = self.retry.send(self.transport.as_ref(), &request).await?;
        interpret_response(&response)
    }
}
