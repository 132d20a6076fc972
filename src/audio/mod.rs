//! Microphone capture and sample conversion.

/// CPAL input stream and ring buffer plumbing.
pub mod capture;

pub use capture::{downmix, resample_linear, write_wav, AudioCapture};
