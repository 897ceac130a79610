//! macOS key synthesis using `CGEvent` keyboard events.
//!
//! Posted at the HID level so they look like hardware input to the
//! focused application. Requires Accessibility permission.

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

use super::{InjectionError, KeySynth};
use crate::keys::{KeyCodeTable, NativeKeyCode, MAC_ANSI};
use crate::permissions;
use crate::sequence::SpecialKey;

/// `KeySynth` backed by Quartz event services
pub struct MacKeySynth {
    /// Modifier flags of keys we currently hold down
    held: CGEventFlags,
}

impl MacKeySynth {
    pub fn new() -> Self {
        Self {
            held: CGEventFlags::empty(),
        }
    }

    fn modifier_flag(code: NativeKeyCode) -> Option<CGEventFlags> {
        match MAC_ANSI.special_key_for_code(code)? {
            SpecialKey::Shift => Some(CGEventFlags::CGEventFlagShift),
            SpecialKey::Control => Some(CGEventFlags::CGEventFlagControl),
            SpecialKey::Alt => Some(CGEventFlags::CGEventFlagAlternate),
            SpecialKey::Command => Some(CGEventFlags::CGEventFlagCommand),
            _ => None,
        }
    }

    fn keyboard_event(code: NativeKeyCode, down: bool) -> Result<CGEvent, InjectionError> {
        // Sources are not Send, so one is created per event
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(|_| {
            InjectionError::SynthesisFailed("failed to create event source".to_string())
        })?;
        CGEvent::new_keyboard_event(source, code, down).map_err(|_| {
            InjectionError::SynthesisFailed(format!("failed to create key event for {}", code))
        })
    }
}

impl KeySynth for MacKeySynth {
    fn key_table(&self) -> &'static KeyCodeTable {
        &MAC_ANSI
    }

    fn is_trusted(&self) -> bool {
        permissions::input_access_granted()
    }

    fn key_event(&mut self, code: NativeKeyCode, down: bool) -> Result<(), InjectionError> {
        if let Some(flag) = Self::modifier_flag(code) {
            if down {
                self.held.insert(flag);
            } else {
                self.held.remove(flag);
            }
        }

        let event = Self::keyboard_event(code, down)?;
        // Without explicit flags the event inherits whatever the user holds
        event.set_flags(self.held);
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn unicode_char(&mut self, ch: char) -> Result<(), InjectionError> {
        let mut buf = [0u8; 4];
        let text = ch.encode_utf8(&mut buf);

        for down in [true, false] {
            let event = Self::keyboard_event(0, down)?;
            event.set_flags(CGEventFlags::empty());
            event.set_string(text);
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }
}
