//! System clipboard access.

use anyhow::{Context, Result};

/// Destination for a copy of the generated message.
pub trait Clipboard: Send {
    /// Replaces the clipboard contents with `text`.
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Clipboard backed by the platform clipboard.
///
/// The platform handle is opened per copy so headless runs that never copy
/// do not fail at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().context("Failed to open the system clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("Failed to copy to the system clipboard")
    }
}
