//! Best-effort desktop notifications through `notify-send`.
//!
//! Errors surface to the user this way. A session without a notification
//! daemon just logs instead, the pipeline itself never depends on it.

use std::process::Command;

const APP_NAME: &str = "Voice Transcribe";
const ICON: &str = "audio-input-microphone";
const TIMEOUT_MS: &str = "5000";

/// Show a transient desktop notification. Failures are logged and swallowed.
pub fn send(title: &str, message: &str) {
    let result = Command::new("notify-send")
        .args(["-a", APP_NAME, "-i", ICON, "-t", TIMEOUT_MS, title, message])
        .status();

    match result {
        Ok(status) if status.success() => {
            tracing::debug!(title, "notification shown");
        }
        Ok(status) => {
            tracing::debug!(title, %status, "notify-send exited with failure");
        }
        Err(error) => {
            tracing::debug!(title, %error, "notify-send unavailable");
        }
    }
}
