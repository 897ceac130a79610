//! Platform-agnostic keyboard listener interface.

use tokio::sync::mpsc;
use tracing::debug;

use super::spec::NativeHotkey;
use super::HotkeyError;
use crate::keys::KeyCodeTable;
use crate::permissions;

/// Notifications sent from the listener to the controlling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The registered chord was pressed
    Triggered,
    /// The OS disabled the listener and it was re-enabled
    ListenerRestarted,
}

/// Thread-safe hand-off used from inside native callbacks.
///
/// Never blocks: if the channel is full the notification is dropped,
/// a pending trigger is already queued.
#[derive(Debug, Clone)]
pub struct HotkeySignal {
    tx: mpsc::Sender<HotkeyEvent>,
}

impl HotkeySignal {
    pub fn new(tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self { tx }
    }

    pub fn triggered(&self) {
        self.post(HotkeyEvent::Triggered);
    }

    pub fn listener_restarted(&self) {
        self.post(HotkeyEvent::ListenerRestarted);
    }

    fn post(&self, event: HotkeyEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!(?event, error = %e, "hotkey notification dropped");
        }
    }
}

/// Native low-level keyboard observer for one platform
pub trait HotkeyBackend: Send {
    /// Layout used to resolve the configured key
    fn key_table(&self) -> &'static KeyCodeTable;

    /// Whether the OS lets this process observe global key events
    fn is_permitted(&self) -> bool;

    /// Text telling the user how to grant the missing permission
    fn permission_hint(&self) -> &'static str {
        permissions::REMEDIATION
    }

    /// Install a listener that swallows key-downs matching `target` and
    /// posts `Triggered` through `signal`.
    fn install(
        &mut self,
        target: NativeHotkey,
        signal: HotkeySignal,
    ) -> Result<Box<dyn ActiveListener>, HotkeyError>;
}

/// A running native listener
pub trait ActiveListener: Send {
    /// Disable and release the listener. Safe to call more than once.
    fn stop(&mut self);
}
