//! Control socket so desktop keybindings can drive the running instance.
//!
//! The app listens on a Unix socket under `$XDG_RUNTIME_DIR`. A second
//! invocation with `--toggle` connects, writes one `toggle` line and exits,
//! which lets any desktop environment bind a key to `voice-transcribe
//! --toggle` without the app registering hotkeys itself.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::info;

use super::{ToggleSignal, ToggleSource};

const SOCKET_NAME: &str = "voice-transcribe.sock";

/// Where the control socket lives for this session.
#[must_use]
pub fn socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR").map_or_else(
        || std::env::temp_dir().join(SOCKET_NAME),
        |dir| PathBuf::from(dir).join(SOCKET_NAME),
    )
}

/// Listening side of the control socket. Removes the socket file on drop.
pub struct IpcToggleListener {
    signals: mpsc::UnboundedReceiver<ToggleSignal>,
    path: PathBuf,
}

impl IpcToggleListener {
    /// Bind the session socket and start accepting commands.
    ///
    /// A leftover socket file from a crashed run is replaced. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn bind() -> Result<Self> {
        Self::bind_at(socket_path())
    }

    fn bind_at(path: PathBuf) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(&path).context("failed to remove stale control socket")?;
        }
        let listener = UnixListener::bind(&path)
            .with_context(|| format!("failed to bind control socket at {}", path.display()))?;
        info!(path = %path.display(), "control socket listening");

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(listener, signals_tx));
        Ok(Self {
            signals: signals_rx,
            path,
        })
    }
}

impl ToggleSource for IpcToggleListener {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn poll(&mut self) -> Option<ToggleSignal> {
        self.signals.try_recv().ok()
    }
}

impl Drop for IpcToggleListener {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            tracing::debug!(%error, "failed to remove control socket");
        }
    }
}

async fn accept_loop(listener: UnixListener, signals: mpsc::UnboundedSender<ToggleSignal>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let signals = signals.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stream).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        match line.trim() {
                            "toggle" => {
                                if signals.send(ToggleSignal).is_err() {
                                    return;
                                }
                            }
                            other => {
                                tracing::debug!(command = other, "unknown control command");
                            }
                        }
                    }
                });
            }
            Err(error) => {
                tracing::warn!(%error, "control socket accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Ask the running instance to toggle recording.
///
/// # Errors
///
/// Returns an error if no instance is listening or the write fails.
pub fn send_toggle() -> Result<()> {
    send_toggle_to(&socket_path())
}

fn send_toggle_to(path: &std::path::Path) -> Result<()> {
    use std::io::Write;

    let mut stream = std::os::unix::net::UnixStream::connect(path).with_context(|| {
        format!(
            "failed to connect to {} (is voice-transcribe running?)",
            path.display()
        )
    })?;
    stream
        .write_all(b"toggle\n")
        .context("failed to send toggle command")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that re-point XDG_RUNTIME_DIR must not interleave.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn scratch_socket(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("vt_ipc_{label}_{nanos}.sock"))
    }

    #[test]
    fn socket_path_prefers_runtime_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = std::env::var_os("XDG_RUNTIME_DIR");

        std::env::set_var("XDG_RUNTIME_DIR", "/run/user/1000");
        let with_runtime_dir = socket_path();
        std::env::remove_var("XDG_RUNTIME_DIR");
        let without_runtime_dir = socket_path();

        if let Some(value) = original {
            std::env::set_var("XDG_RUNTIME_DIR", value);
        }
        assert_eq!(
            with_runtime_dir,
            PathBuf::from("/run/user/1000/voice-transcribe.sock")
        );
        assert_eq!(
            without_runtime_dir,
            std::env::temp_dir().join("voice-transcribe.sock")
        );
    }

    #[test]
    fn send_without_listener_names_the_socket() {
        let path = scratch_socket("orphan");
        let result = send_toggle_to(&path);
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("is voice-transcribe running?"));
    }

    #[tokio::test]
    async fn toggle_command_round_trips() {
        let path = scratch_socket("roundtrip");
        let mut listener = IpcToggleListener::bind_at(path.clone()).unwrap();

        send_toggle_to(&path).unwrap();

        let mut received = None;
        for _ in 0..100 {
            if let Some(signal) = listener.poll() {
                received = Some(signal);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received, Some(ToggleSignal));
    }

    #[tokio::test]
    async fn unknown_commands_are_ignored() {
        use std::io::Write;

        let path = scratch_socket("unknown");
        let mut listener = IpcToggleListener::bind_at(path.clone()).unwrap();

        let mut stream = std::os::unix::net::UnixStream::connect(&path).unwrap();
        stream.write_all(b"paste\ntoggle\n").unwrap();
        drop(stream);

        let mut received = None;
        for _ in 0..100 {
            if let Some(signal) = listener.poll() {
                received = Some(signal);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // The bad line is skipped, the good one still lands.
        assert_eq!(received, Some(ToggleSignal));
        assert_eq!(listener.poll(), None);
    }

    #[tokio::test]
    async fn stale_socket_file_is_replaced() {
        let path = scratch_socket("stale");
        std::fs::write(&path, b"").unwrap();

        let listener = IpcToggleListener::bind_at(path.clone()).unwrap();
        send_toggle_to(&path).unwrap();
        drop(listener);

        // Drop removed the socket file again.
        assert!(!path.exists());
    }
}
