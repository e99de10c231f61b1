//! Model calls: transport, retries, the chat client, prompts and budgeting.

pub mod error;
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod token_budget;
pub mod transport;

pub use error::AiError;
pub use openai::{ChatRequest, Completion, OpenAiClient, TokenUsage};
pub use retry::RetryPolicy;
pub use token_budget::RequestEstimate;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
