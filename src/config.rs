//! Persistent settings stored as JSON under `~/.config/voice-transcribe/`.
//!
//! Loading never fails on bad user input: a malformed file falls back to
//! defaults wholesale, and individual out-of-range values are replaced
//! per-field while the rest of the file is honored.

use anyhow::{Context, Result};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Capture rate handed to the recognizer. 16 kHz is what whisper.cpp expects.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Accepted capture rates. Values outside this range are replaced on load.
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8_000..=48_000;

/// How many recordings the on-disk ring keeps by default.
pub const DEFAULT_MAX_RECORDINGS: usize = 5;

/// Accepted ring sizes. Values outside this range are replaced on load.
pub const MAX_RECORDINGS_RANGE: RangeInclusive<usize> = 1..=100;

fn default_hotkey() -> String {
    "Ctrl+Shift+R".to_owned()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_whisper_path() -> String {
    "~/whisper.cpp".to_owned()
}

fn default_max_recordings() -> usize {
    DEFAULT_MAX_RECORDINGS
}

/// The ggml model the recognizer is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WhisperModel {
    /// `ggml-tiny.bin`, fastest and least accurate.
    Tiny,
    /// `ggml-base.bin`, the stock choice.
    #[default]
    Base,
    /// `ggml-small.bin`.
    Small,
    /// `ggml-medium.bin`.
    Medium,
    /// `ggml-large.bin`, slowest and most accurate.
    Large,
}

impl WhisperModel {
    /// Every supported model, in size order.
    pub const ALL: [Self; 5] = [
        Self::Tiny,
        Self::Base,
        Self::Small,
        Self::Medium,
        Self::Large,
    ];

    /// The short name used in config files and model filenames.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Parse a short name. Returns `None` for anything unrecognized.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Filename of the ggml weights inside the whisper.cpp `models/` dir.
    #[must_use]
    pub fn ggml_filename(self) -> String {
        format!("ggml-{}.bin", self.name())
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for WhisperModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for WhisperModel {
    // Unknown model names degrade to the default instead of rejecting the
    // whole config file.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name).unwrap_or_default())
    }
}

/// User settings, one flat table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether the global hotkey is registered at startup.
    #[serde(default)]
    pub hotkey_enabled: bool,
    /// Toggle combination, e.g. `Ctrl+Shift+R`.
    #[serde(default = "default_hotkey")]
    pub hotkey: String,
    /// Capture rate in Hz for the WAV handed to the recognizer.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Which ggml model to transcribe with.
    #[serde(default)]
    pub whisper_model: WhisperModel,
    /// Root of a built whisper.cpp checkout. `~` is expanded on use.
    #[serde(default = "default_whisper_path")]
    pub whisper_path: String,
    /// How many recordings to keep on disk before evicting the oldest.
    #[serde(default = "default_max_recordings")]
    pub max_recordings: usize,
    /// Mirror logs into `voice-transcribe.log` next to the config file.
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey_enabled: false,
            hotkey: default_hotkey(),
            sample_rate: default_sample_rate(),
            whisper_model: WhisperModel::default(),
            whisper_path: default_whisper_path(),
            max_recordings: default_max_recordings(),
            log_to_file: false,
        }
    }
}

impl Config {
    /// Load settings from disk, writing a default file on first run.
    ///
    /// A file that does not parse as JSON is replaced by defaults in memory
    /// (the file itself is left alone). Individual out-of-range fields are
    /// repaired without touching the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is unset or the config directory cannot
    /// be created or read.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        if !config_path.exists() {
            let config = Self::default();
            config.save().context("failed to write default config")?;
            tracing::info!(path = %config_path.display(), "created default config");
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;

        let config = match serde_json::from_str::<Self>(&contents) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, path = %config_path.display(), "config file is malformed, using defaults");
                Self::default()
            }
        };

        Ok(config.repaired())
    }

    /// Write settings back to disk as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let contents =
            serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&config_path, contents).context("failed to write config file")?;
        Ok(())
    }

    /// Replace out-of-range numeric fields with their defaults.
    #[must_use]
    pub fn repaired(mut self) -> Self {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            tracing::debug!(
                sample_rate = self.sample_rate,
                "sample rate out of range, using default"
            );
            self.sample_rate = DEFAULT_SAMPLE_RATE;
        }
        if !MAX_RECORDINGS_RANGE.contains(&self.max_recordings) {
            tracing::debug!(
                max_recordings = self.max_recordings,
                "max recordings out of range, using default"
            );
            self.max_recordings = DEFAULT_MAX_RECORDINGS;
        }
        self
    }

    /// Path of `config.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is not set.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// The app's directory under `~/.config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is not set.
    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".config").join("voice-transcribe"))
    }

    /// Where captured WAV files are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is not set.
    pub fn recordings_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("recordings"))
    }

    /// Expand a leading `~/` to the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path starts with `~/` and `HOME` is not set.
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(rest) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(rest))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}
