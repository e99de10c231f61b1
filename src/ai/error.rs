//! Call-level error taxonomy.

use thiserror::Error;

/// Failure of one logical model call, after retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// The endpoint rejected the credentials (401/403). Never retried.
    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthenticationFailed {
        /// HTTP status code.
        status: u16,
        /// Error body from the endpoint.
        message: String,
    },

    /// Still rate limited after the final attempt.
    #[error("Rate limit still exceeded after {attempts} attempts: {message}")]
    RateLimited {
        /// Attempts made.
        attempts: u32,
        /// Last failure seen.
        message: String,
    },

    /// The prompt does not fit the model's context window.
    #[error("Context length exceeded{}", describe_overflow(.max_context, .requested_tokens))]
    ContextLengthExceeded {
        /// Window size reported by the endpoint, if parseable.
        max_context: Option<usize>,
        /// Tokens the request needed, if parseable.
        requested_tokens: Option<usize>,
    },

    /// Server errors, timeouts or connection failures outlasted every attempt.
    #[error("Request failed after {attempts} attempts: {message}")]
    TransientTransport {
        /// Attempts made.
        attempts: u32,
        /// Last failure seen.
        message: String,
    },

    /// Any other non-success response.
    #[error("API request failed (HTTP {status}): {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error body from the endpoint.
        message: String,
    },

    /// The endpoint answered 2xx with a body we could not use.
    #[error("Invalid response format from API: {0}")]
    InvalidResponse(String),

    /// Non-network failure, such as a malformed request.
    #[error("{0}")]
    Fatal(String),
}

pub(crate) fn describe_overflow(
    max_context: &Option<usize>,
    requested_tokens: &Option<usize>,
) -> String {
    match (max_context, requested_tokens) {
        (Some(max), Some(requested)) => {
            format!(": requested {requested} tokens, model allows {max}")
        }
        (Some(max), None) => format!(": model allows {max} tokens"),
        (None, Some(requested)) => format!(": requested {requested} tokens"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_message_includes_known_numbers() {
        let err = AiError::ContextLengthExceeded {
            max_context: Some(8000),
            requested_tokens: Some(9000),
        };
        assert_eq!(
            err.to_string(),
            "Context length exceeded: requested 9000 tokens, model allows 8000"
        );
        let bare = AiError::ContextLengthExceeded {
            max_context: None,
            requested_tokens: None,
        };
        assert_eq!(bare.to_string(), "Context length exceeded");
    }
}
