//! Utility functions and helpers.

pub mod clipboard;
pub mod credentials;
pub mod interaction;
