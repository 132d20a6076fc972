//! Tray icon and menu.
//!
//! The icon is a plain colored circle drawn at startup, one per status, so
//! no image assets ship with the binary. Red means ready, green recording,
//! amber transcribing. The menu mirrors the current status and offers the
//! same toggle the hotkey delivers.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIconBuilder};

use crate::status::{Status, StatusController};

const ICON_SIZE: u32 = 32;

// Icon fill per status, RGBA.
const COLOR_READY: [u8; 4] = [0xF4, 0x43, 0x36, 0xFF];
const COLOR_RECORDING: [u8; 4] = [0x4C, 0xAF, 0x50, 0xFF];
const COLOR_PROCESSING: [u8; 4] = [0xFF, 0xC1, 0x07, 0xFF];

const MENU_ID_TOGGLE: &str = "toggle";
const MENU_ID_OPEN_CONFIG: &str = "open-config";
const MENU_ID_QUIT: &str = "quit";

/// Menu actions the event loop acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    /// Same meaning as a hotkey press.
    ToggleRecording,
    /// Open `config.json` in the desktop's editor.
    OpenConfigFile,
    /// Leave the event loop.
    Quit,
}

/// Owner of the tray icon. Keeps icon and menu in step with the status.
pub struct TrayManager {
    tray: tray_icon::TrayIcon,
    controller: Arc<StatusController>,
    shown: Status,
    cached_icons: HashMap<Status, Icon>,
}

impl TrayManager {
    /// Draw the three status icons and put the tray up.
    ///
    /// # Errors
    ///
    /// Returns an error if icon or menu construction fails.
    pub fn new(controller: Arc<StatusController>) -> Result<Self> {
        let mut cached_icons = HashMap::new();
        for status in [Status::Ready, Status::Recording, Status::Processing] {
            cached_icons.insert(status, load_icon(status)?);
        }

        let shown = controller.current();
        let icon = cached_icons
            .get(&shown)
            .cloned()
            .with_context(|| format!("icon for {shown:?} not in cache"))?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(build_menu(shown)?))
            .with_tooltip("Voice Transcribe")
            .with_icon(icon)
            .build()
            .context("failed to build tray icon")?;

        Ok(Self {
            tray,
            controller,
            shown,
            cached_icons,
        })
    }

    /// Swap icon and menu when the status moved since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if the tray refuses the new icon or menu.
    pub fn refresh(&mut self) -> Result<()> {
        let status = self.controller.current();
        if status == self.shown {
            return Ok(());
        }
        tracing::debug!(from = ?self.shown, to = ?status, "updating tray");

        let icon = self
            .cached_icons
            .get(&status)
            .cloned()
            .with_context(|| format!("icon for {status:?} not in cache"))?;
        self.tray
            .set_icon(Some(icon))
            .context("failed to update tray icon")?;
        self.tray.set_menu(Some(Box::new(build_menu(status)?)));

        self.shown = status;
        Ok(())
    }

    /// Take the next pending menu click, if any. Never blocks.
    pub fn poll_events() -> Option<TrayCommand> {
        if let Ok(event) = MenuEvent::receiver().try_recv() {
            let id = event.id.0.as_str();
            tracing::debug!(id, "tray menu event");
            return parse_menu_event(id);
        }
        None
    }
}

fn build_menu(status: Status) -> Result<Menu> {
    let menu = Menu::new();

    let status_line = MenuItem::new(status_text(status), false, None);
    menu.append(&status_line)
        .context("failed to append status item")?;
    menu.append(&PredefinedMenuItem::separator())
        .context("failed to append separator")?;

    let (toggle_label, toggle_enabled) = toggle_entry(status);
    let toggle = MenuItem::with_id(MENU_ID_TOGGLE, toggle_label, toggle_enabled, None);
    menu.append(&toggle)
        .context("failed to append toggle item")?;
    menu.append(&PredefinedMenuItem::separator())
        .context("failed to append separator")?;

    let open_config = MenuItem::with_id(MENU_ID_OPEN_CONFIG, "Open Config File", true, None);
    menu.append(&open_config)
        .context("failed to append open config item")?;

    let quit = MenuItem::with_id(MENU_ID_QUIT, "Quit", true, None);
    menu.append(&quit).context("failed to append quit item")?;

    Ok(menu)
}

fn parse_menu_event(id: &str) -> Option<TrayCommand> {
    match id {
        MENU_ID_TOGGLE => Some(TrayCommand::ToggleRecording),
        MENU_ID_OPEN_CONFIG => Some(TrayCommand::OpenConfigFile),
        MENU_ID_QUIT => Some(TrayCommand::Quit),
        _ => None,
    }
}

const fn status_text(status: Status) -> &'static str {
    match status {
        Status::Ready => "Voice Transcribe - Ready",
        Status::Recording => "Recording...",
        Status::Processing => "Transcribing...",
    }
}

// Label and enabled flag for the toggle item. Disabled while a job runs.
const fn toggle_entry(status: Status) -> (&'static str, bool) {
    match status {
        Status::Ready => ("Start Recording", true),
        Status::Recording => ("Stop Recording", true),
        Status::Processing => ("Start Recording", false),
    }
}

const fn status_color(status: Status) -> [u8; 4] {
    match status {
        Status::Ready => COLOR_READY,
        Status::Recording => COLOR_RECORDING,
        Status::Processing => COLOR_PROCESSING,
    }
}

/// A filled circle on a transparent square.
#[allow(clippy::cast_precision_loss)] // Pixel coordinates are tiny
fn render_status_image(status: Status) -> image::RgbaImage {
    let color = status_color(status);
    let mut img = image::RgbaImage::new(ICON_SIZE, ICON_SIZE);
    let center = (ICON_SIZE - 1) as f32 / 2.0;
    let radius = ICON_SIZE as f32 / 2.0 - 1.0;

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        *pixel = if dx.mul_add(dx, dy * dy) <= radius * radius {
            image::Rgba(color)
        } else {
            image::Rgba([0, 0, 0, 0])
        };
    }
    img
}

fn load_icon(status: Status) -> Result<Icon> {
    let img = render_status_image(status);
    let (width, height) = img.dimensions();
    Icon::from_rgba(img.into_raw(), width, height)
        .context("failed to create icon from RGBA data")
}
