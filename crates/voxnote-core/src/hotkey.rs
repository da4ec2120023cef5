//! Global hotkey binding.
//!
//! The OS-level combination is an enhancement, not a dependency: any binding
//! failure is logged and the service keeps running with HTTP-only control.
//! Presses are forwarded over a channel so the OS shortcut thread never waits
//! on session or provider work.

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Built-in toggle combination.
pub const DEFAULT_HOTKEY: &str = "Ctrl+Alt+E";

#[derive(Default)]
pub struct HotkeyDispatcher {
    manager: Option<GlobalHotKeyManager>,
    registered: Option<HotKey>,
}

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `combination` with the OS and forward each press as one
    /// toggle signal on `toggle_tx`. Returns `false` after logging when the
    /// combination cannot be bound.
    pub fn bind(&mut self, combination: &str, toggle_tx: UnboundedSender<()>) -> bool {
        let hotkey: HotKey = match combination.parse() {
            Ok(hotkey) => hotkey,
            Err(err) => {
                warn!("cannot parse hotkey '{combination}': {err}; continuing without one");
                return false;
            }
        };

        let manager = match GlobalHotKeyManager::new() {
            Ok(manager) => manager,
            Err(err) => {
                warn!("global hotkey manager unavailable: {err}; continuing without one");
                return false;
            }
        };

        if let Err(err) = manager.register(hotkey) {
            warn!("failed to register '{combination}': {err}; continuing without one");
            return false;
        }

        let id = hotkey.id();
        let listener = std::thread::Builder::new()
            .name("voxnote-hotkey".into())
            .spawn(move || {
                let receiver = GlobalHotKeyEvent::receiver();
                while let Ok(event) = receiver.recv() {
                    if event.id != id || event.state != HotKeyState::Pressed {
                        continue;
                    }
                    // consumer gone means shutdown
                    if toggle_tx.send(()).is_err() {
                        break;
                    }
                }
            });
        if let Err(err) = listener {
            warn!("failed to spawn hotkey listener: {err}; continuing without one");
            let _ = manager.unregister(hotkey);
            return false;
        }

        self.manager = Some(manager);
        self.registered = Some(hotkey);
        info!("global hotkey '{combination}' bound");
        true
    }

    /// Unregister and drop the OS binding. Safe to call repeatedly, and when
    /// `bind` never succeeded.
    pub fn unbind(&mut self) {
        if let (Some(manager), Some(hotkey)) = (self.manager.take(), self.registered.take()) {
            if let Err(err) = manager.unregister(hotkey) {
                warn!("failed to unregister hotkey: {err}");
            }
            info!("global hotkey unbound");
        }
    }
}

impl Drop for HotkeyDispatcher {
    fn drop(&mut self) {
        self.unbind();
    }
}
