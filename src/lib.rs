//! Voice Transcribe - Linux voice-to-text tray utility
//!
//! This library exports core modules for testing and potential future reuse.

/// Audio capture and processing
pub mod audio;
/// Clipboard handoff
pub mod clipboard;
/// Configuration management
pub mod config;
/// Toggle sources (global hotkey, IPC socket)
pub mod hotkey;
/// Desktop notifications
pub mod notify;
/// Recording retention on disk
pub mod recordings;
/// Recording status state machine
pub mod status;
/// Logging setup
pub mod telemetry;
/// Whisper transcription runner
pub mod transcription;
/// Tray icon and menu
pub mod tray;
/// Background transcription worker
pub mod worker;
