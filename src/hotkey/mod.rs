//! Global hotkey monitoring
//!
//! Platform-specific listeners:
//! - macOS: CGEventTap (requires Accessibility permission)
//! - Windows: WH_KEYBOARD_LL hook
//! - Other platforms: registration fails with `UnsupportedPlatform`
//!
//! Listeners run on a dedicated thread and only hand notifications to the
//! controlling thread through a channel.

mod backend;
mod monitor;
mod spec;
mod unsupported;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

pub use backend::{ActiveListener, HotkeyBackend, HotkeyEvent, HotkeySignal};
pub use monitor::{HotkeyMonitor, MonitorState};
pub use spec::{HotkeyKey, HotkeyParseError, HotkeySpec, Modifiers, NativeHotkey};
pub use unsupported::UnsupportedHotkeyBackend;

#[cfg(test)]
pub(crate) use monitor::tests::FakeBackend;

/// Errors that can occur while registering a hotkey
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    EmptyChord,

    #[error("key '{0}' cannot be used as a global hotkey")]
    UnmappableKey(String),

    /// Carries the text telling the user which setting to change
    #[error("global hotkey not permitted: {0}")]
    PermissionDenied(String),

    #[error("failed to create keyboard listener: {0}")]
    TapCreationFailed(String),

    #[error("global hotkeys are not supported on this platform")]
    UnsupportedPlatform,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Create the listener backend for the current platform
pub fn platform_backend() -> Box<dyn HotkeyBackend> {
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacHotkeyBackend::new())
    }

    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsHotkeyBackend::new())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Box::new(UnsupportedHotkeyBackend::new())
    }
}
