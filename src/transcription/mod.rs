/// whisper.cpp subprocess runner
pub mod runner;

pub use runner::{clean_transcript, RecognizeError, Recognizer, WhisperCli};
