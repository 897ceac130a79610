//! Hotkey backend for platforms without a native listener.

use super::backend::{ActiveListener, HotkeyBackend, HotkeySignal};
use super::spec::NativeHotkey;
use super::HotkeyError;
use crate::keys::KeyCodeTable;

#[derive(Debug, Default)]
pub struct UnsupportedHotkeyBackend {
    _private: (),
}

impl UnsupportedHotkeyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HotkeyBackend for UnsupportedHotkeyBackend {
    fn key_table(&self) -> &'static KeyCodeTable {
        KeyCodeTable::native()
    }

    fn is_permitted(&self) -> bool {
        // Nothing to grant; install reports the real problem
        true
    }

    fn install(
        &mut self,
        _target: NativeHotkey,
        _signal: HotkeySignal,
    ) -> Result<Box<dyn ActiveListener>, HotkeyError> {
        Err(HotkeyError::UnsupportedPlatform)
    }
}
