//! OS-independent hotkey chords
//!
//! A `HotkeySpec` is what the user configures ("Ctrl+Alt+A"). It is only
//! turned into a native key code + modifier mask inside registration.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use super::HotkeyError;
use crate::keys::{KeyCodeTable, NativeKeyCode};
use crate::sequence::SpecialKey;

bitflags! {
    /// Held modifier keys
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        /// Command on macOS, the Windows key elsewhere
        const COMMAND = 1 << 3;
    }
}

/// The non-modifier key of a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyKey {
    Special(SpecialKey),
    /// Printable character, letters stored lowercase
    Char(char),
}

impl fmt::Display for HotkeyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyKey::Special(key) => write!(f, "{}", key),
            HotkeyKey::Char(ch) => write!(f, "{}", ch.to_ascii_uppercase()),
        }
    }
}

/// Errors from parsing a hotkey string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyParseError {
    #[error("hotkey string is empty")]
    Empty,
    #[error("hotkey has no key, only modifiers")]
    MissingKey,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("hotkey has more than one key: '{0}'")]
    DuplicateKey(String),
}

/// Key + modifier chord. The default value is the empty chord.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HotkeySpec {
    key: Option<HotkeyKey>,
    modifiers: Modifiers,
}

impl HotkeySpec {
    pub fn new(key: HotkeyKey, modifiers: Modifiers) -> Self {
        let key = match key {
            HotkeyKey::Char(ch) => HotkeyKey::Char(ch.to_ascii_lowercase()),
            other => other,
        };
        Self {
            key: Some(key),
            modifiers,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<HotkeyKey> {
        self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }

    /// Parse strings like `Ctrl+Alt+A`, `cmd+shift+F5` or `Ctrl++`.
    pub fn parse(s: &str) -> Result<Self, HotkeyParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HotkeyParseError::Empty);
        }

        // A trailing "++" means the plus key itself
        let (body, plus_key) = match s.strip_suffix("++") {
            Some(body) => (body, true),
            None if s == "+" => ("", true),
            None => (s, false),
        };

        let mut modifiers = Modifiers::empty();
        let mut key = plus_key.then_some(HotkeyKey::Char('+'));

        for part in body.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
                "alt" | "opt" | "option" => modifiers |= Modifiers::ALT,
                "shift" => modifiers |= Modifiers::SHIFT,
                "cmd" | "command" | "meta" | "super" | "win" => modifiers |= Modifiers::COMMAND,
                _ => {
                    if key.is_some() {
                        return Err(HotkeyParseError::DuplicateKey(part.to_string()));
                    }
                    key = Some(parse_key(part)?);
                }
            }
        }

        let key = key.ok_or(HotkeyParseError::MissingKey)?;
        Ok(Self::new(key, modifiers))
    }

    /// Resolve against a native layout table.
    pub(crate) fn to_native(&self, table: &KeyCodeTable) -> Result<NativeHotkey, HotkeyError> {
        let key = self.key.ok_or(HotkeyError::EmptyChord)?;
        let unmappable = || HotkeyError::UnmappableKey(key.to_string());

        match key {
            // Modifiers alone never arrive as key-down events
            HotkeyKey::Special(special) if special.is_modifier() => Err(unmappable()),
            HotkeyKey::Special(special) => {
                let code = table.special_key_code(special).ok_or_else(unmappable)?;
                Ok(NativeHotkey::new(code, self.modifiers))
            }
            HotkeyKey::Char(ch) => {
                let char_key = table.char_to_code(ch).ok_or_else(unmappable)?;
                let mut modifiers = self.modifiers;
                if char_key.shift {
                    modifiers |= Modifiers::SHIFT;
                }
                Ok(NativeHotkey::new(char_key.code, modifiers))
            }
        }
    }
}

fn parse_key(part: &str) -> Result<HotkeyKey, HotkeyParseError> {
    if let Some(special) = SpecialKey::from_name(part) {
        return Ok(HotkeyKey::Special(special));
    }
    let mut chars = part.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_graphic() => Ok(HotkeyKey::Char(ch)),
        _ => Err(HotkeyParseError::UnknownKey(part.to_string())),
    }
}

impl FromStr for HotkeySpec {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(key) = self.key else {
            return Ok(());
        };
        for (flag, name) in [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::COMMAND, "Cmd"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", key)
    }
}

/// Native form of a registered chord, immutable once the listener runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHotkey {
    pub code: NativeKeyCode,
    pub modifiers: Modifiers,
}

impl NativeHotkey {
    pub fn new(code: NativeKeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// Exact match on key code and held modifiers
    pub fn matches(&self, code: NativeKeyCode, held: Modifiers) -> bool {
        self.code == code && self.modifiers == held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{MAC_ANSI, WINDOWS_US};

    #[test]
    fn test_parse_basic() {
        let spec = HotkeySpec::parse("Ctrl+Alt+A").unwrap();
        assert_eq!(spec.key(), Some(HotkeyKey::Char('a')));
        assert_eq!(spec.modifiers(), Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(spec.to_string(), "Ctrl+Alt+A");
    }

    #[test]
    fn test_parse_aliases_and_spacing() {
        let spec: HotkeySpec = " cmd + option + f5 ".parse().unwrap();
        assert_eq!(spec.key(), Some(HotkeyKey::Special(SpecialKey::F5)));
        assert_eq!(spec.modifiers(), Modifiers::COMMAND | Modifiers::ALT);
    }

    #[test]
    fn test_parse_plus_key() {
        let spec = HotkeySpec::parse("Ctrl++").unwrap();
        assert_eq!(spec.key(), Some(HotkeyKey::Char('+')));
        assert_eq!(spec.modifiers(), Modifiers::CONTROL);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(HotkeySpec::parse(""), Err(HotkeyParseError::Empty));
        assert_eq!(
            HotkeySpec::parse("Ctrl+Shift"),
            Err(HotkeyParseError::MissingKey)
        );
        assert_eq!(
            HotkeySpec::parse("Ctrl+Banana"),
            Err(HotkeyParseError::UnknownKey("Banana".into()))
        );
        assert_eq!(
            HotkeySpec::parse("Ctrl+A+B"),
            Err(HotkeyParseError::DuplicateKey("B".into()))
        );
    }

    #[test]
    fn test_empty_spec() {
        let spec = HotkeySpec::empty();
        assert!(spec.is_empty());
        assert_eq!(spec.to_string(), "");
        assert_eq!(spec.to_native(&MAC_ANSI), Err(HotkeyError::EmptyChord));
    }

    #[test]
    fn test_to_native() {
        let spec = HotkeySpec::parse("Ctrl+Alt+A").unwrap();
        let native = spec.to_native(&WINDOWS_US).unwrap();
        assert_eq!(native.code, 0x41);
        assert!(native.matches(0x41, Modifiers::CONTROL | Modifiers::ALT));
        assert!(!native.matches(0x41, Modifiers::CONTROL));
        assert!(!native.matches(0x42, Modifiers::CONTROL | Modifiers::ALT));

        let spec = HotkeySpec::parse("Cmd+F12").unwrap();
        assert_eq!(spec.to_native(&MAC_ANSI).unwrap().code, 0x6F);
    }

    #[test]
    fn test_shifted_char_adds_shift() {
        let spec = HotkeySpec::new(HotkeyKey::Char('!'), Modifiers::CONTROL);
        let native = spec.to_native(&WINDOWS_US).unwrap();
        assert_eq!(native.code, 0x31);
        assert_eq!(native.modifiers, Modifiers::CONTROL | Modifiers::SHIFT);
    }

    #[test]
    fn test_modifier_as_key_unmappable() {
        let spec = HotkeySpec::new(HotkeyKey::Special(SpecialKey::Shift), Modifiers::CONTROL);
        assert!(matches!(
            spec.to_native(&MAC_ANSI),
            Err(HotkeyError::UnmappableKey(_))
        ));
    }
}
