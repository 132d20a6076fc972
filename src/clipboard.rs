//! Clipboard handoff for finished transcripts.
//!
//! The arboard handle is created once and held for the life of the worker.
//! On X11 the process owns the selection, so dropping the handle early
//! would lose the text.

use anyhow::{Context, Result};

/// Destination for transcript text, mockable in tests.
pub trait TextSink: Send {
    /// Publish one transcript.
    ///
    /// # Errors
    ///
    /// Returns an error if the text could not be delivered.
    fn publish(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard via arboard.
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    /// Connect to the clipboard. A failure is logged, not fatal, so the
    /// app still runs on sessions without one. Publishing then errors.
    #[must_use]
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(error) => {
                tracing::warn!(%error, "clipboard unavailable");
                None
            }
        };
        Self { inner }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSink for SystemClipboard {
    fn publish(&mut self, text: &str) -> Result<()> {
        let clipboard = self
            .inner
            .as_mut()
            .context("clipboard not available in this session")?;
        clipboard
            .set_text(text.to_owned())
            .context("failed to copy text to clipboard")?;
        tracing::info!(chars = text.len(), "transcript copied to clipboard");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_clipboard_reports_an_error() {
        let mut sink = SystemClipboard { inner: None };
        let result = sink.publish("hello");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("clipboard not available"));
    }

    #[test]
    #[ignore = "requires a desktop session"]
    fn publish_round_trips_through_the_clipboard() {
        let mut sink = SystemClipboard::new();
        sink.publish("voice transcribe test").unwrap();

        let mut clipboard = arboard::Clipboard::new().unwrap();
        assert_eq!(clipboard.get_text().unwrap(), "voice transcribe test");
    }
}
