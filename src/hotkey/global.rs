//! System-wide hotkey registration through the global-hotkey crate.

use anyhow::{Context, Result};
use global_hotkey::{
    hotkey::HotKey, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use tracing::info;

use super::{parse_combination, ToggleSignal, ToggleSource};

/// A registered global hotkey. Unregisters itself on drop.
pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl HotkeyListener {
    /// Parse and register a combination like `Ctrl+Shift+R`.
    ///
    /// Registration fails when another application already claimed the
    /// combination. The caller decides whether that is fatal, here it is
    /// reported and the app keeps running without a hotkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the combination does not parse, the hotkey
    /// manager cannot be created, or registration is refused.
    pub fn register(combo: &str) -> Result<Self> {
        let (modifiers, code) = parse_combination(combo)
            .with_context(|| format!("invalid hotkey combination {combo:?}"))?;

        let manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;
        let hotkey = HotKey::new(Some(modifiers), code);
        manager.register(hotkey).with_context(|| {
            format!("failed to register hotkey {combo:?} (is it taken by another application?)")
        })?;

        info!(combo, "registered global hotkey");
        Ok(Self { manager, hotkey })
    }
}

impl ToggleSource for HotkeyListener {
    fn name(&self) -> &'static str {
        "hotkey"
    }

    // Presses toggle, releases are ignored.
    fn poll(&mut self) -> Option<ToggleSignal> {
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.id == self.hotkey.id() && matches!(event.state, HotKeyState::Pressed) {
                return Some(ToggleSignal);
            }
        }
        None
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        if let Err(error) = self.manager.unregister(self.hotkey) {
            tracing::error!(%error, "failed to unregister hotkey");
        }
    }
}
