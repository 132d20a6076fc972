//! Toggle signal sources.
//!
//! Recording is flipped by exactly one kind of event, a [`ToggleSignal`].
//! Where it comes from is behind [`ToggleSource`], so the event loop treats
//! the global hotkey, the control socket and any future source the same.

use anyhow::{anyhow, Context, Result};
use global_hotkey::hotkey::{Code, Modifiers};

/// The global hotkey backend.
pub mod global;
/// Unix socket control channel for external toggles.
pub mod ipc;

pub use global::HotkeyListener;
pub use ipc::{send_toggle, IpcToggleListener};

/// One user request to flip between recording and not recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleSignal;

/// A non-blocking producer of toggle signals.
pub trait ToggleSource {
    /// Short name for logs.
    fn name(&self) -> &'static str;
    /// Take the next pending signal, if any. Never blocks.
    fn poll(&mut self) -> Option<ToggleSignal>;
}

/// Parse a combination like `Ctrl+Shift+R` into global-hotkey types.
///
/// The last segment is the key, everything before it a modifier. Letters
/// are accepted in either case.
///
/// # Errors
///
/// Returns an error for an empty combination, an unknown modifier or an
/// unsupported key.
pub fn parse_combination(combo: &str) -> Result<(Modifiers, Code)> {
    let segments: Vec<&str> = combo
        .split('+')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    let (key, modifier_names) = segments
        .split_last()
        .context("empty hotkey combination")?;

    let mut modifiers = Modifiers::empty();
    for name in modifier_names {
        modifiers |= parse_modifier(name)?;
    }
    Ok((modifiers, parse_key(key)?))
}

fn parse_modifier(name: &str) -> Result<Modifiers> {
    match name {
        "Control" | "Ctrl" => Ok(Modifiers::CONTROL),
        "Alt" | "Option" => Ok(Modifiers::ALT),
        "Super" | "Command" | "Meta" => Ok(Modifiers::SUPER),
        "Shift" => Ok(Modifiers::SHIFT),
        _ => Err(anyhow!("unknown modifier: {name}")),
    }
}

fn parse_key(key: &str) -> Result<Code> {
    match key.to_ascii_uppercase().as_str() {
        "A" => Ok(Code::KeyA),
        "B" => Ok(Code::KeyB),
        "C" => Ok(Code::KeyC),
        "D" => Ok(Code::KeyD),
        "E" => Ok(Code::KeyE),
        "F" => Ok(Code::KeyF),
        "G" => Ok(Code::KeyG),
        "H" => Ok(Code::KeyH),
        "I" => Ok(Code::KeyI),
        "J" => Ok(Code::KeyJ),
        "K" => Ok(Code::KeyK),
        "L" => Ok(Code::KeyL),
        "M" => Ok(Code::KeyM),
        "N" => Ok(Code::KeyN),
        "O" => Ok(Code::KeyO),
        "P" => Ok(Code::KeyP),
        "Q" => Ok(Code::KeyQ),
        "R" => Ok(Code::KeyR),
        "S" => Ok(Code::KeyS),
        "T" => Ok(Code::KeyT),
        "U" => Ok(Code::KeyU),
        "V" => Ok(Code::KeyV),
        "W" => Ok(Code::KeyW),
        "X" => Ok(Code::KeyX),
        "Y" => Ok(Code::KeyY),
        "Z" => Ok(Code::KeyZ),
        "0" => Ok(Code::Digit0),
        "1" => Ok(Code::Digit1),
        "2" => Ok(Code::Digit2),
        "3" => Ok(Code::Digit3),
        "4" => Ok(Code::Digit4),
        "5" => Ok(Code::Digit5),
        "6" => Ok(Code::Digit6),
        "7" => Ok(Code::Digit7),
        "8" => Ok(Code::Digit8),
        "9" => Ok(Code::Digit9),
        "SPACE" => Ok(Code::Space),
        _ => Err(anyhow!("unsupported key: {key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_combination() {
        let (modifiers, code) = parse_combination("Ctrl+Shift+R").unwrap();
        assert_eq!(modifiers, Modifiers::CONTROL | Modifiers::SHIFT);
        assert_eq!(code, Code::KeyR);
    }

    #[test]
    fn parses_modifier_aliases() {
        let (modifiers, _) = parse_combination("Control+Option+Command+Z").unwrap();
        assert_eq!(
            modifiers,
            Modifiers::CONTROL | Modifiers::ALT | Modifiers::SUPER
        );
    }

    #[test]
    fn key_is_case_insensitive() {
        let (_, upper) = parse_combination("Ctrl+R").unwrap();
        let (_, lower) = parse_combination("Ctrl+r").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn parses_digits_and_space() {
        assert_eq!(parse_combination("Ctrl+1").unwrap().1, Code::Digit1);
        assert_eq!(parse_combination("Alt+Space").unwrap().1, Code::Space);
    }

    #[test]
    fn bare_key_has_no_modifiers() {
        let (modifiers, code) = parse_combination("R").unwrap();
        assert!(modifiers.is_empty());
        assert_eq!(code, Code::KeyR);
    }

    #[test]
    fn whitespace_around_segments_is_tolerated() {
        let (modifiers, code) = parse_combination(" Ctrl + Shift + R ").unwrap();
        assert_eq!(modifiers, Modifiers::CONTROL | Modifiers::SHIFT);
        assert_eq!(code, Code::KeyR);
    }

    #[test]
    fn rejects_unknown_modifier() {
        let result = parse_combination("Hyper+R");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unknown modifier: Hyper"));
    }

    #[test]
    fn rejects_unsupported_key() {
        let result = parse_combination("Ctrl+F13");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported key: F13"));
    }

    #[test]
    fn rejects_empty_combination() {
        assert!(parse_combination("").is_err());
        assert!(parse_combination("+").is_err());
    }
}
