//! Static per-platform key code tables
//!
//! Maps abstract keys and printable characters to native key codes so the
//! injectors and hotkey listeners never carry inline code literals.
//! Tables are plain data and compiled on every target so they can be
//! tested anywhere.

mod macos;
mod windows;

use crate::sequence::SpecialKey;

pub use self::macos::MAC_ANSI;
pub use self::windows::{EXTENDED_KEYS as WINDOWS_EXTENDED_KEYS, WINDOWS_US};

/// Platform virtual key code
pub type NativeKeyCode = u16;

/// A character resolved against a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharKey {
    pub code: NativeKeyCode,
    pub shift: bool,
}

/// Key code lookup for one keyboard layout
#[derive(Debug)]
pub struct KeyCodeTable {
    name: &'static str,
    specials: &'static [(SpecialKey, NativeKeyCode)],
    /// (unshifted, shifted, code) for every printable key
    chars: &'static [(char, char, NativeKeyCode)],
}

impl KeyCodeTable {
    pub const fn new(
        name: &'static str,
        specials: &'static [(SpecialKey, NativeKeyCode)],
        chars: &'static [(char, char, NativeKeyCode)],
    ) -> Self {
        Self {
            name,
            specials,
            chars,
        }
    }

    /// Table for the layout of the platform we are running on
    pub fn native() -> &'static KeyCodeTable {
        #[cfg(target_os = "macos")]
        {
            &MAC_ANSI
        }
        #[cfg(not(target_os = "macos"))]
        {
            &WINDOWS_US
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn special_key_code(&self, key: SpecialKey) -> Option<NativeKeyCode> {
        self.specials
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, code)| *code)
    }

    pub fn special_key_for_code(&self, code: NativeKeyCode) -> Option<SpecialKey> {
        self.specials
            .iter()
            .find(|(_, candidate)| *candidate == code)
            .map(|(key, _)| *key)
    }

    /// Resolve a character to the key that produces it.
    ///
    /// Tab and line breaks resolve to their special keys. Anything outside
    /// the table returns `None` and must go through Unicode synthesis.
    pub fn char_to_code(&self, ch: char) -> Option<CharKey> {
        let special = match ch {
            '\t' => Some(SpecialKey::Tab),
            '\n' | '\r' => Some(SpecialKey::Enter),
            _ => None,
        };
        if let Some(key) = special {
            return self
                .special_key_code(key)
                .map(|code| CharKey { code, shift: false });
        }

        self.chars.iter().find_map(|&(plain, shifted, code)| {
            if plain == ch {
                Some(CharKey { code, shift: false })
            } else if shifted == ch {
                Some(CharKey { code, shift: true })
            } else {
                None
            }
        })
    }

    /// Character produced by pressing `key.code` with or without Shift
    pub fn code_to_char(&self, key: CharKey) -> Option<char> {
        self.chars
            .iter()
            .find(|(_, _, code)| *code == key.code)
            .map(|&(plain, shifted, _)| if key.shift { shifted } else { plain })
    }
}
