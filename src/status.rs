//! Recording state machine shared between the UI thread and the worker.
//!
//! All toggle sources funnel into [`StatusController::toggle`], which decides
//! under one lock what the signal means. A toggle while a transcription is
//! still running is ignored, so a second job can never start early.

use std::sync::{Mutex, PoisonError};

/// What the app is doing right now. Drives the tray icon color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Idle, waiting for a toggle.
    Ready,
    /// Microphone capture is running.
    Recording,
    /// A recording is being transcribed.
    Processing,
}

/// What the caller should do after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    /// Begin microphone capture.
    StartRecording,
    /// Stop capture and hand the samples to the worker.
    StopAndTranscribe,
    /// Nothing. The toggle arrived while transcription was in flight.
    Ignored,
}

/// Where the next state comes from. Pure so it can be tested exhaustively.
const fn transition(current: Status) -> (Status, ToggleAction) {
    match current {
        Status::Ready => (Status::Recording, ToggleAction::StartRecording),
        Status::Recording => (Status::Processing, ToggleAction::StopAndTranscribe),
        Status::Processing => (Status::Processing, ToggleAction::Ignored),
    }
}

/// Owner of the current [`Status`]. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct StatusController {
    state: Mutex<Status>,
}

impl StatusController {
    /// Start in [`Status::Ready`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Status::Ready),
        }
    }

    /// The state as of this instant.
    pub fn current(&self) -> Status {
        *self.lock()
    }

    /// Apply one toggle signal and report what it meant.
    pub fn toggle(&self) -> ToggleAction {
        let mut state = self.lock();
        let (next, action) = transition(*state);
        if *state == next {
            tracing::debug!(state = ?*state, "toggle ignored");
        } else {
            tracing::info!(from = ?*state, to = ?next, "state change");
            *state = next;
        }
        action
    }

    /// Mark the in-flight transcription finished and return to idle.
    ///
    /// Called by the worker after every job, success or failure.
    pub fn finish(&self) {
        let mut state = self.lock();
        if *state == Status::Processing {
            tracing::info!(from = ?Status::Processing, to = ?Status::Ready, "state change");
        } else {
            tracing::warn!(state = ?*state, "finish called outside of processing");
        }
        *state = Status::Ready;
    }

    /// Abandon a capture that failed to start and return to idle.
    pub fn reset(&self) {
        let mut state = self.lock();
        if *state != Status::Ready {
            tracing::info!(from = ?*state, to = ?Status::Ready, "state reset");
        }
        *state = Status::Ready;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Status> {
        // Status is Copy, so a poisoned guard still holds a coherent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn transition_table() {
        assert_eq!(
            transition(Status::Ready),
            (Status::Recording, ToggleAction::StartRecording)
        );
        assert_eq!(
            transition(Status::Recording),
            (Status::Processing, ToggleAction::StopAndTranscribe)
        );
        assert_eq!(
            transition(Status::Processing),
            (Status::Processing, ToggleAction::Ignored)
        );
    }

    #[test]
    fn toggle_walks_ready_recording_processing() {
        let controller = StatusController::new();
        assert_eq!(controller.current(), Status::Ready);

        assert_eq!(controller.toggle(), ToggleAction::StartRecording);
        assert_eq!(controller.current(), Status::Recording);

        assert_eq!(controller.toggle(), ToggleAction::StopAndTranscribe);
        assert_eq!(controller.current(), Status::Processing);
    }

    #[test]
    fn toggle_during_processing_is_ignored() {
        let controller = StatusController::new();
        controller.toggle();
        controller.toggle();

        assert_eq!(controller.toggle(), ToggleAction::Ignored);
        assert_eq!(controller.toggle(), ToggleAction::Ignored);
        assert_eq!(controller.current(), Status::Processing);
    }

    #[test]
    fn finish_returns_to_ready() {
        let controller = StatusController::new();
        controller.toggle();
        controller.toggle();
        controller.finish();
        assert_eq!(controller.current(), Status::Ready);
    }

    #[test]
    fn finish_when_not_processing_still_lands_on_ready() {
        let controller = StatusController::new();
        controller.finish();
        assert_eq!(controller.current(), Status::Ready);

        controller.toggle();
        controller.finish();
        assert_eq!(controller.current(), Status::Ready);
    }

    #[test]
    fn reset_abandons_recording() {
        let controller = StatusController::new();
        controller.toggle();
        controller.reset();
        assert_eq!(controller.current(), Status::Ready);
    }

    #[test]
    fn concurrent_toggles_during_processing_start_nothing() {
        let controller = Arc::new(StatusController::new());
        controller.toggle();
        controller.toggle();
        assert_eq!(controller.current(), Status::Processing);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || controller.toggle())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), ToggleAction::Ignored);
        }
        assert_eq!(controller.current(), Status::Processing);
    }

    #[test]
    fn concurrent_toggles_from_ready_start_exactly_one_recording() {
        let controller = Arc::new(StatusController::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || controller.toggle())
            })
            .collect();
        let actions: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let starts = actions
            .iter()
            .filter(|a| **a == ToggleAction::StartRecording)
            .count();
        let stops = actions
            .iter()
            .filter(|a| **a == ToggleAction::StopAndTranscribe)
            .count();
        assert_eq!(starts, 1);
        assert!(stops <= 1);
    }
}
