//! # diffscribe
//!
//! Generates git commit messages for uncommitted changes using any
//! OpenAI-compatible chat completions endpoint.
//!
//! ## Features
//!
//! - Models addressed by name, `@alias` or unique prefix
//! - Self-healing default model selection
//! - Retries with `Retry-After` support and exponential backoff
//! - Automatic diff truncation when the context window overflows
//!
//! ## Quick Start
//!
//! ```rust
//! use diffscribe::git::truncate_diff;
//!
//! let truncated = truncate_diff("diff --git a/x b/x\n", 1_000);
//! assert!(!truncated.truncated);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod config;
pub mod generate;
pub mod git;
pub mod models;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::cli::Cli;

/// The current version of diffscribe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
