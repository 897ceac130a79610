//! Windows key synthesis using `SendInput`.
//!
//! Characters outside the US table are sent as `KEYEVENTF_UNICODE`
//! events, one per UTF-16 unit.

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, VIRTUAL_KEY,
};

use super::{InjectionError, KeySynth};
use crate::keys::{KeyCodeTable, NativeKeyCode, WINDOWS_EXTENDED_KEYS, WINDOWS_US};
use crate::permissions;

/// `KeySynth` backed by `SendInput`
pub struct WindowsKeySynth {
    _private: (),
}

impl WindowsKeySynth {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn keyboard_input(vk: u16, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn send(inputs: &[INPUT]) -> Result<(), InjectionError> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            // UIPI blocks input into higher-integrity windows
            return Err(InjectionError::SynthesisFailed(format!(
                "SendInput accepted {} of {} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }
}

impl KeySynth for WindowsKeySynth {
    fn key_table(&self) -> &'static KeyCodeTable {
        &WINDOWS_US
    }

    fn is_trusted(&self) -> bool {
        permissions::input_access_granted()
    }

    fn key_event(&mut self, code: NativeKeyCode, down: bool) -> Result<(), InjectionError> {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if WINDOWS_EXTENDED_KEYS.contains(&code) {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if !down {
            flags |= KEYEVENTF_KEYUP;
        }
        Self::send(&[Self::keyboard_input(code, 0, flags)])
    }

    fn unicode_char(&mut self, ch: char) -> Result<(), InjectionError> {
        let mut units = [0u16; 2];
        let mut inputs = Vec::with_capacity(4);
        for &unit in ch.encode_utf16(&mut units).iter() {
            inputs.push(Self::keyboard_input(0, unit, KEYEVENTF_UNICODE));
            inputs.push(Self::keyboard_input(
                0,
                unit,
                KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
            ));
        }
        Self::send(&inputs)
    }
}
