//! Voice Transcribe - Linux voice-to-text tray utility.
//!
//! Wires capture, transcription, clipboard and tray together and runs the
//! event loop. All blocking work happens off this thread.

use anyhow::Result;
use clap::Parser;
use std::sync::{mpsc, Arc};

use voice_transcribe::audio::AudioCapture;
use voice_transcribe::clipboard::SystemClipboard;
use voice_transcribe::config::Config;
use voice_transcribe::hotkey::{self, HotkeyListener, IpcToggleListener, ToggleSource};
use voice_transcribe::notify;
use voice_transcribe::recordings::RecordingStore;
use voice_transcribe::status::{StatusController, ToggleAction};
use voice_transcribe::telemetry;
use voice_transcribe::transcription::WhisperCli;
use voice_transcribe::tray::{TrayCommand, TrayManager};
use voice_transcribe::worker::{Job, Outcome, Worker};

/// Voice transcription from the system tray.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Toggle recording in the running instance and exit.
    #[arg(long)]
    toggle: bool,
}

#[tokio::main]
#[allow(clippy::print_stdout)] // Startup checklist goes to the terminal
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.toggle {
        hotkey::send_toggle()?;
        println!("toggle sent");
        return Ok(());
    }

    // Phase 1: Foundation
    let config = Config::load()?;
    telemetry::init(config.log_to_file)?;
    tracing::info!("voice-transcribe starting");
    println!("✓ Config loaded from {}", Config::config_path()?.display());

    let store = RecordingStore::open(&config)?;
    println!("✓ Recordings directory ready: {}", store.dir().display());

    let controller = Arc::new(StatusController::new());

    // Capture is created lazily, so a missing microphone at startup does
    // not keep the app from coming up.
    let mut capture = match AudioCapture::new(&config) {
        Ok(ready) => {
            println!("✓ Audio capture ready");
            Some(ready)
        }
        Err(error) => {
            tracing::warn!(%error, "audio capture unavailable at startup");
            println!("! Audio capture unavailable (will retry on first use)");
            None
        }
    };

    // Phase 2: Transcription pipeline
    let (outcome_tx, outcome_rx) = mpsc::channel();
    let recognizer = Arc::new(WhisperCli::new(&config)?);
    let worker = Worker::spawn(
        Arc::clone(&controller),
        store,
        recognizer,
        Box::new(SystemClipboard::new()),
        outcome_tx,
    )?;
    println!("✓ Transcription worker running");

    // Phase 3: Toggle sources
    let mut sources: Vec<Box<dyn ToggleSource>> = Vec::new();
    if config.hotkey_enabled {
        match HotkeyListener::register(&config.hotkey) {
            Ok(listener) => {
                println!("✓ Hotkey registered: {}", config.hotkey);
                sources.push(Box::new(listener));
            }
            Err(error) => {
                tracing::warn!(%error, hotkey = %config.hotkey, "hotkey unavailable");
                notify::send("Hotkey unavailable", "Use the tray menu or --toggle instead");
            }
        }
    }
    match IpcToggleListener::bind() {
        Ok(listener) => {
            println!("✓ Toggle socket listening");
            sources.push(Box::new(listener));
        }
        Err(error) => tracing::warn!(%error, "toggle socket unavailable"),
    }

    // Phase 4: Tray
    let mut tray = TrayManager::new(Arc::clone(&controller))?;
    println!("✓ Tray icon up");

    tracing::info!("event loop starting (press Ctrl+C to exit)");
    println!("\nVoice Transcribe is running. Toggle recording from the tray menu,");
    println!("the hotkey, or `voice-transcribe --toggle`. Press Ctrl+C to exit.\n");

    loop {
        // Toggle signals from the hotkey and the control socket.
        for source in &mut sources {
            if source.poll().is_some() {
                tracing::debug!(source = source.name(), "toggle received");
                handle_toggle(&controller, &mut capture, &worker, &config);
            }
        }

        // Tray menu clicks.
        if let Some(command) = TrayManager::poll_events() {
            match command {
                TrayCommand::ToggleRecording => {
                    handle_toggle(&controller, &mut capture, &worker, &config);
                }
                TrayCommand::OpenConfigFile => open_config_file(),
                TrayCommand::Quit => {
                    tracing::info!("quit requested from tray");
                    break;
                }
            }
        }

        // Results from the worker thread.
        while let Ok(outcome) = outcome_rx.try_recv() {
            match outcome {
                Outcome::Finished { text } => {
                    tracing::info!(chars = text.len(), "transcript on clipboard");
                }
                Outcome::Failed { message } => {
                    tracing::warn!(%message, "transcription failed");
                    notify::send("Transcription failed", &message);
                }
            }
        }

        if let Err(error) = tray.refresh() {
            tracing::warn!(%error, "tray refresh failed");
        }

        // Check for shutdown signal
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(10)) => {
                // Poll interval (10ms to avoid busy-waiting)
            }
        }
    }

    // Dropping the worker joins its thread, letting a running job finish.
    Ok(())
}

/// Drive one toggle through the state machine and act on the outcome.
fn handle_toggle(
    controller: &StatusController,
    capture: &mut Option<AudioCapture>,
    worker: &Worker,
    config: &Config,
) {
    match controller.toggle() {
        ToggleAction::StartRecording => {
            if capture.is_none() {
                match AudioCapture::new(config) {
                    Ok(ready) => *capture = Some(ready),
                    Err(error) => {
                        tracing::error!(%error, "audio capture unavailable");
                        notify::send("Recording failed", &format!("{error:#}"));
                        controller.reset();
                        return;
                    }
                }
            }
            if let Some(active) = capture.as_mut() {
                if let Err(error) = active.start_recording() {
                    tracing::error!(%error, "failed to start recording");
                    notify::send("Recording failed", &format!("{error:#}"));
                    controller.reset();
                }
            }
        }
        ToggleAction::StopAndTranscribe => {
            let Some(active) = capture.as_mut() else {
                tracing::warn!("no active capture to stop");
                controller.finish();
                return;
            };
            match active.stop_recording() {
                Ok(samples) => {
                    let job = Job::Transcribe {
                        samples,
                        sample_rate: config.sample_rate,
                    };
                    if let Err(error) = worker.submit(job) {
                        tracing::error!(%error, "failed to queue transcription");
                        notify::send("Transcription failed", &format!("{error:#}"));
                        controller.finish();
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "failed to stop recording");
                    notify::send("Recording failed", &format!("{error:#}"));
                    controller.finish();
                }
            }
        }
        ToggleAction::Ignored => {
            tracing::debug!("toggle ignored while transcribing");
        }
    }
}

/// Hand `config.json` to the desktop's default editor.
fn open_config_file() {
    let path = match Config::config_path() {
        Ok(path) => path,
        Err(error) => {
            tracing::error!(%error, "cannot locate config file");
            return;
        }
    };
    match std::process::Command::new("xdg-open").arg(&path).spawn() {
        Ok(mut child) => {
            tracing::info!(path = %path.display(), "opening config file");
            // Reap off the event loop, some handlers keep xdg-open alive.
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(error) => tracing::error!(%error, "failed to open config file"),
    }
}
