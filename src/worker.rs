//! Dedicated thread for the blocking transcription pipeline.
//!
//! The UI thread hands finished takes over a channel and stays responsive
//! while the worker writes the WAV, runs the recognizer and publishes the
//! transcript. Exactly one job runs at a time, and the worker always calls
//! [`StatusController::finish`] so the state machine cannot wedge in
//! `Processing`.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::audio;
use crate::clipboard::TextSink;
use crate::recordings::RecordingStore;
use crate::status::StatusController;
use crate::transcription::{RecognizeError, Recognizer};

/// Work submitted by the UI thread.
#[derive(Debug)]
pub enum Job {
    /// Transcribe one finished take.
    Transcribe {
        /// Mono samples at `sample_rate`.
        samples: Vec<f32>,
        /// Rate the samples were converted to.
        sample_rate: u32,
    },
}

/// What became of a job, reported back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Transcript is on the clipboard.
    Finished {
        /// The transcript text.
        text: String,
    },
    /// Something went wrong. The message is ready for a notification.
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

/// Handle to the worker thread. Dropping it shuts the thread down.
pub struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(
        controller: Arc<StatusController>,
        store: RecordingStore,
        recognizer: Arc<dyn Recognizer>,
        sink: Box<dyn TextSink>,
        outcomes: mpsc::Sender<Outcome>,
    ) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("transcription-worker".to_owned())
            .spawn(move || run(&jobs_rx, &controller, &store, recognizer.as_ref(), sink, &outcomes))
            .context("failed to spawn transcription worker")?;

        Ok(Self {
            jobs: Some(jobs_tx),
            thread: Some(thread),
        })
    }

    /// Queue one job.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread has stopped.
    pub fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .as_ref()
            .context("worker already shut down")?
            .send(job)
            .map_err(|_| anyhow::anyhow!("transcription worker has stopped"))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel ends the run loop.
        drop(self.jobs.take());
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("transcription worker panicked");
            }
        }
    }
}

fn run(
    jobs: &mpsc::Receiver<Job>,
    controller: &StatusController,
    store: &RecordingStore,
    recognizer: &dyn Recognizer,
    mut sink: Box<dyn TextSink>,
    outcomes: &mpsc::Sender<Outcome>,
) {
    tracing::debug!("transcription worker started");
    while let Ok(job) = jobs.recv() {
        let outcome = handle_job(job, store, recognizer, sink.as_mut());
        controller.finish();
        if outcomes.send(outcome).is_err() {
            tracing::debug!("outcome receiver dropped");
        }
    }
    tracing::debug!("transcription worker exiting");
}

fn handle_job(
    job: Job,
    store: &RecordingStore,
    recognizer: &dyn Recognizer,
    sink: &mut dyn TextSink,
) -> Outcome {
    let Job::Transcribe {
        samples,
        sample_rate,
    } = job;
    let _span = tracing::debug_span!("transcription_job", samples = samples.len()).entered();

    if samples.is_empty() {
        tracing::info!("discarding empty take");
        return Outcome::Failed {
            message: RecognizeError::EmptyRecording.to_string(),
        };
    }

    let wav = match store.allocate() {
        Ok(path) => path,
        Err(error) => {
            return Outcome::Failed {
                message: format!("{error:#}"),
            }
        }
    };
    if let Err(error) = audio::write_wav(&samples, sample_rate, &wav) {
        return Outcome::Failed {
            message: format!("{error:#}"),
        };
    }

    // The new take is on disk, evict the oldest beyond the bound.
    if let Err(error) = store.prune() {
        tracing::warn!(%error, "failed to prune recordings");
    }

    match recognizer.recognize(&wav) {
        Ok(text) => match sink.publish(&text) {
            Ok(()) => Outcome::Finished { text },
            Err(error) => Outcome::Failed {
                message: format!("{error:#}"),
            },
        },
        Err(error) => {
            // A take that produced nothing is not worth keeping.
            store.discard(&wav);
            Outcome::Failed {
                message: error.to_string(),
            }
        }
    }
}
