//! Bounded on-disk ring of captured WAV files.
//!
//! Every transcription writes `recording_{unix_ts}.wav` into the store, then
//! prunes so at most `max_recordings` files remain. Pruning is the only thing
//! that ever deletes a good recording. Transcripts left next to a WAV by the
//! recognizer are removed together with it.

use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Directory handle plus retention bound.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
    max_recordings: usize,
}

impl RecordingStore {
    /// Open the store under `~/.config/voice-transcribe/recordings`,
    /// creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is unset or the directory cannot be created.
    pub fn open(config: &Config) -> Result<Self> {
        let dir = Config::recordings_dir()?;
        fs::create_dir_all(&dir).context("failed to create recordings directory")?;
        Ok(Self::at(dir, config.max_recordings))
    }

    /// Use an explicit directory. The caller guarantees it exists.
    #[must_use]
    pub const fn at(dir: PathBuf, max_recordings: usize) -> Self {
        Self {
            dir,
            max_recordings,
        }
    }

    /// The directory recordings live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pick a fresh `recording_{unix_ts}.wav` path.
    ///
    /// Names stay strictly increasing even when eviction frees up an older
    /// timestamp, so sorting by name is sorting by age.
    ///
    /// # Errors
    ///
    /// Returns an error if the system clock is before the Unix epoch or the
    /// directory cannot be listed.
    pub fn allocate(&self) -> Result<PathBuf> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("failed to get current time")?
            .as_secs();
        let newest = self.list()?.into_iter().map(|(_, ts)| ts).max();
        let mut timestamp = match newest {
            Some(newest) if newest >= now => newest + 1,
            _ => now,
        };
        let mut path = self.dir.join(format!("recording_{timestamp}.wav"));
        while path.exists() {
            timestamp += 1;
            path = self.dir.join(format!("recording_{timestamp}.wav"));
        }
        Ok(path)
    }

    /// Delete the oldest recordings beyond the retention bound.
    ///
    /// Returns the number of WAV files deleted. Individual deletion failures
    /// are logged and skipped so one stuck file cannot grow the ring forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory listing fails.
    pub fn prune(&self) -> Result<usize> {
        let mut recordings = self.list()?;
        if recordings.len() <= self.max_recordings {
            return Ok(0);
        }

        // Newest first, keep the head.
        recordings.sort_by(|a, b| b.1.cmp(&a.1));

        let mut deleted = 0;
        for (path, _) in recordings.iter().skip(self.max_recordings) {
            match fs::remove_file(path) {
                Ok(()) => {
                    deleted += 1;
                    tracing::debug!(path = %path.display(), "evicted recording");
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to evict recording");
                }
            }
            remove_sidecar(path);
        }
        Ok(deleted)
    }

    /// Delete one recording and its transcript sidecar, ignoring errors.
    ///
    /// Used when transcription fails and the WAV has nothing to show for it.
    pub fn discard(&self, path: &Path) {
        if let Err(error) = fs::remove_file(path) {
            tracing::debug!(path = %path.display(), %error, "failed to discard recording");
        }
        remove_sidecar(path);
    }

    /// Count recordings currently on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory listing fails.
    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Whether the store holds no recordings.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory listing fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.list()?.is_empty())
    }

    // All recording_{ts}.wav entries with their parsed timestamps. Foreign
    // files in the directory are left alone.
    fn list(&self) -> Result<Vec<(PathBuf, u64)>> {
        let entries = fs::read_dir(&self.dir).context("failed to read recordings directory")?;
        Ok(entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_file() {
                    return None;
                }
                let timestamp = parse_timestamp(path.file_name()?.to_str()?)?;
                Some((path, timestamp))
            })
            .collect())
    }
}

fn parse_timestamp(filename: &str) -> Option<u64> {
    filename
        .strip_prefix("recording_")?
        .strip_suffix(".wav")?
        .parse()
        .ok()
}

// whisper.cpp's -otxt mode writes `<input>.wav.txt` next to the input.
fn remove_sidecar(wav: &Path) {
    let sidecar = wav.with_extension("wav.txt");
    if sidecar.exists() {
        if let Err(error) = fs::remove_file(&sidecar) {
            tracing::debug!(path = %sidecar.display(), %error, "failed to remove transcript sidecar");
        }
    }
}
