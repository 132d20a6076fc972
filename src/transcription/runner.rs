//! Transcription by shelling out to a local whisper.cpp build.
//!
//! The recognizer binary is resolved fresh on every run so the user can
//! build whisper.cpp or download a model while the app is already running.
//! Output is captured through scratch files, which keeps the child from
//! ever blocking on a full pipe.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::{Config, WhisperModel};

/// Hung transcriptions are killed after this long.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Binary names tried under the whisper.cpp root, in order. Newer builds
/// ship `build/bin/whisper-cli`, older ones `main`.
const BINARY_CANDIDATES: [&str; 3] = ["build/bin/whisper-cli", "build/bin/main", "main"];

/// Most stderr is whisper.cpp system info. Keep only the tail for messages.
const STDERR_EXCERPT_LINES: usize = 4;
const STDERR_EXCERPT_CHARS: usize = 300;

/// Errors that can end a transcription run.
#[derive(Debug, Error)]
pub enum RecognizeError {
    /// No recognizer binary under the configured whisper.cpp root.
    #[error("whisper-cli not found under {dir} (build whisper.cpp with: cmake -B build && cmake --build build -j)")]
    BinaryNotFound {
        /// The root that was searched.
        dir: String,
    },

    /// The ggml weights for the configured model are missing.
    #[error("model file {path} not found (fetch it with: ./models/download-ggml-model.sh {model})")]
    ModelNotFound {
        /// Expected location of the weights.
        path: String,
        /// The configured model.
        model: WhisperModel,
    },

    /// The recording held no samples at all.
    #[error("recording contains no audio")]
    EmptyRecording,

    /// The recognizer ran fine but produced no words.
    #[error("no speech detected")]
    NoSpeech,

    /// The recognizer exited with a failure status.
    #[error("whisper-cli failed ({status}): {stderr}")]
    Failed {
        /// Exit status of the child.
        status: std::process::ExitStatus,
        /// Tail of the child's stderr.
        stderr: String,
    },

    /// The recognizer exceeded the deadline and was killed.
    #[error("transcription timed out after {0:?}")]
    TimedOut(Duration),

    /// Spawning or talking to the child failed.
    #[error("failed to run whisper-cli")]
    Io(#[from] std::io::Error),
}

/// Transcription seam, mockable in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Recognizer: Send + Sync {
    /// Turn a WAV file into transcript text.
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer is missing, fails, times out or
    /// hears nothing.
    fn recognize(&self, wav: &Path) -> Result<String, RecognizeError>;
}

/// Recognizer backed by a whisper.cpp checkout on disk.
pub struct WhisperCli {
    root: PathBuf,
    model: WhisperModel,
    timeout: Duration,
}

impl WhisperCli {
    /// Point at the whisper.cpp root named in the config.
    ///
    /// Existence of the binary and model is checked per run, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured path starts with `~/` and `HOME`
    /// is not set.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let root = Config::expand_path(&config.whisper_path)?;
        Ok(Self {
            root,
            model: config.whisper_model,
            timeout: TRANSCRIBE_TIMEOUT,
        })
    }

    /// Override the kill deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn binary_path(&self) -> Result<PathBuf, RecognizeError> {
        BINARY_CANDIDATES
            .iter()
            .map(|candidate| self.root.join(candidate))
            .find(|path| path.is_file())
            .ok_or_else(|| RecognizeError::BinaryNotFound {
                dir: self.root.display().to_string(),
            })
    }

    fn model_path(&self) -> Result<PathBuf, RecognizeError> {
        let path = self.root.join("models").join(self.model.ggml_filename());
        if path.is_file() {
            Ok(path)
        } else {
            Err(RecognizeError::ModelNotFound {
                path: path.display().to_string(),
                model: self.model,
            })
        }
    }

    fn wait_with_deadline(
        &self,
        child: &mut std::process::Child,
    ) -> Result<std::process::ExitStatus, RecognizeError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                tracing::warn!(timeout = ?self.timeout, "killing stuck recognizer");
                if let Err(error) = child.kill() {
                    tracing::warn!(%error, "failed to kill recognizer");
                }
                let _ = child.wait();
                return Err(RecognizeError::TimedOut(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Recognizer for WhisperCli {
    fn recognize(&self, wav: &Path) -> Result<String, RecognizeError> {
        let binary = self.binary_path()?;
        let model = self.model_path()?;

        let _span = tracing::debug_span!("transcription", wav = %wav.display()).entered();
        tracing::debug!(binary = %binary.display(), model = %model.display(), "starting recognizer");

        let stdout_file = NamedTempFile::new()?;
        let stderr_file = NamedTempFile::new()?;

        let start = Instant::now();
        let mut child = Command::new(&binary)
            .arg("-m")
            .arg(&model)
            .arg("-f")
            .arg(wav)
            .arg("-nt")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.reopen()?))
            .stderr(Stdio::from(stderr_file.reopen()?))
            .spawn()?;

        let status = self.wait_with_deadline(&mut child)?;
        let inference_duration = start.elapsed();

        if !status.success() {
            let raw = fs::read_to_string(stderr_file.path()).unwrap_or_default();
            return Err(RecognizeError::Failed {
                status,
                stderr: stderr_excerpt(&raw),
            });
        }

        let raw = fs::read_to_string(stdout_file.path())?;
        let text = clean_transcript(&raw);

        // Some whisper.cpp invocations drop a transcript next to the input.
        let sidecar = wav.with_extension("wav.txt");
        if sidecar.exists() {
            let _ = fs::remove_file(sidecar);
        }

        if text.is_empty() {
            return Err(RecognizeError::NoSpeech);
        }

        tracing::info!(
            inference_ms = inference_duration.as_millis(),
            text_len = text.len(),
            "transcription completed"
        );
        Ok(text)
    }
}

/// Strip whisper.cpp timestamp prefixes and join lines into one string.
///
/// Lines like `[00:00:00.000 --> 00:00:02.000]  hello` keep only the text
/// after the first `]`. Blank lines and bracket-only markers disappear.
#[must_use]
pub fn clean_transcript(raw: &str) -> String {
    let mut parts = Vec::new();
    for line in raw.lines() {
        let text = match line.split_once(']') {
            Some((_, rest)) => rest,
            None => line,
        };
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join(" ")
}

fn stderr_excerpt(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.trim().lines().rev().take(STDERR_EXCERPT_LINES).collect();
    lines.reverse();
    let excerpt = lines.join(" ");
    if excerpt.chars().count() > STDERR_EXCERPT_CHARS {
        excerpt.chars().take(STDERR_EXCERPT_CHARS).collect()
    } else {
        excerpt
    }
}
