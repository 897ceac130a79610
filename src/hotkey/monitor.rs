//! Registration state machine around a native listener.
//!
//! All mutations take `&mut self`, so they can only happen on the thread
//! that owns the monitor. The native callback only sees the immutable
//! `NativeHotkey` and a `HotkeySignal`.

use tokio::sync::mpsc;
use tracing::{error, info};

use super::backend::{ActiveListener, HotkeyBackend, HotkeyEvent, HotkeySignal};
use super::spec::HotkeySpec;
use super::HotkeyError;

/// Lifecycle of the registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Unregistered,
    Registering,
    Registered,
}

/// Owns at most one system-wide hotkey registration
pub struct HotkeyMonitor {
    backend: Box<dyn HotkeyBackend>,
    signal: HotkeySignal,
    state: MonitorState,
    current: HotkeySpec,
    listener: Option<Box<dyn ActiveListener>>,
}

impl HotkeyMonitor {
    /// Create a monitor that delivers notifications on `event_tx`
    pub fn new(backend: Box<dyn HotkeyBackend>, event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            backend,
            signal: HotkeySignal::new(event_tx),
            state: MonitorState::Unregistered,
            current: HotkeySpec::empty(),
            listener: None,
        }
    }

    /// Replace any existing registration with `spec`.
    ///
    /// On failure the monitor is left `Unregistered`.
    pub fn register_hotkey(&mut self, spec: HotkeySpec) -> Result<(), HotkeyError> {
        self.unregister_hotkey();

        if spec.is_empty() {
            return Err(HotkeyError::EmptyChord);
        }
        let target = spec.to_native(self.backend.key_table())?;

        if !self.backend.is_permitted() {
            error!(hotkey = %spec, "hotkey registration refused, input monitoring not permitted");
            return Err(HotkeyError::PermissionDenied(
                self.backend.permission_hint().to_string(),
            ));
        }

        self.state = MonitorState::Registering;
        match self.backend.install(target, self.signal.clone()) {
            Ok(listener) => {
                self.listener = Some(listener);
                self.current = spec;
                self.state = MonitorState::Registered;
                info!(hotkey = %self.current, code = target.code, "hotkey registered");
                Ok(())
            }
            Err(e) => {
                self.state = MonitorState::Unregistered;
                error!(hotkey = %spec, error = %e, "failed to install hotkey listener");
                Err(e)
            }
        }
    }

    /// Release the native listener. Idempotent.
    pub fn unregister_hotkey(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
            info!(hotkey = %self.current, "hotkey unregistered");
        }
        self.current = HotkeySpec::empty();
        self.state = MonitorState::Unregistered;
    }

    pub fn is_registered(&self) -> bool {
        self.state == MonitorState::Registered
    }

    /// The registered chord, empty when unregistered
    pub fn current_hotkey(&self) -> &HotkeySpec {
        &self.current
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }
}

impl Drop for HotkeyMonitor {
    fn drop(&mut self) {
        self.unregister_hotkey();
    }
}
