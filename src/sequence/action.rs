//! Primitive input actions produced by the compiler
//!
//! A `CompiledSequence` is the only thing the injector ever sees. Text
//! payloads may carry secrets, so they are wiped when the sequence drops
//! and never printed by `Debug`.

use std::fmt;

use zeroize::Zeroize;

/// Keys that can be addressed by name in a template or a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Tab,
    Enter,
    Space,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Shift,
    Control,
    Alt,
    /// Command on macOS, the Windows key elsewhere
    Command,
}

impl SpecialKey {
    /// Modifier keys, in the order they are released before typing
    pub const MODIFIERS: [SpecialKey; 4] = [
        SpecialKey::Shift,
        SpecialKey::Control,
        SpecialKey::Alt,
        SpecialKey::Command,
    ];

    /// Every key, used by the key tables' completeness tests
    pub const ALL: [SpecialKey; 31] = [
        SpecialKey::Tab,
        SpecialKey::Enter,
        SpecialKey::Space,
        SpecialKey::Backspace,
        SpecialKey::Delete,
        SpecialKey::Insert,
        SpecialKey::Home,
        SpecialKey::End,
        SpecialKey::PageUp,
        SpecialKey::PageDown,
        SpecialKey::Left,
        SpecialKey::Right,
        SpecialKey::Up,
        SpecialKey::Down,
        SpecialKey::Escape,
        SpecialKey::F1,
        SpecialKey::F2,
        SpecialKey::F3,
        SpecialKey::F4,
        SpecialKey::F5,
        SpecialKey::F6,
        SpecialKey::F7,
        SpecialKey::F8,
        SpecialKey::F9,
        SpecialKey::F10,
        SpecialKey::F11,
        SpecialKey::F12,
        SpecialKey::Shift,
        SpecialKey::Control,
        SpecialKey::Alt,
        SpecialKey::Command,
    ];

    /// Resolve a key name or alias. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_uppercase().as_str() {
            "TAB" => SpecialKey::Tab,
            "ENTER" => SpecialKey::Enter,
            "SPACE" => SpecialKey::Space,
            "BACKSPACE" | "BKSP" | "BS" => SpecialKey::Backspace,
            "DELETE" | "DEL" => SpecialKey::Delete,
            "INSERT" | "INS" => SpecialKey::Insert,
            "HOME" => SpecialKey::Home,
            "END" => SpecialKey::End,
            "PAGEUP" | "PGUP" => SpecialKey::PageUp,
            "PAGEDOWN" | "PGDN" => SpecialKey::PageDown,
            "LEFT" => SpecialKey::Left,
            "RIGHT" => SpecialKey::Right,
            "UP" => SpecialKey::Up,
            "DOWN" => SpecialKey::Down,
            "ESCAPE" | "ESC" => SpecialKey::Escape,
            "F1" => SpecialKey::F1,
            "F2" => SpecialKey::F2,
            "F3" => SpecialKey::F3,
            "F4" => SpecialKey::F4,
            "F5" => SpecialKey::F5,
            "F6" => SpecialKey::F6,
            "F7" => SpecialKey::F7,
            "F8" => SpecialKey::F8,
            "F9" => SpecialKey::F9,
            "F10" => SpecialKey::F10,
            "F11" => SpecialKey::F11,
            "F12" => SpecialKey::F12,
            "SHIFT" => SpecialKey::Shift,
            "CONTROL" | "CTRL" => SpecialKey::Control,
            "ALT" => SpecialKey::Alt,
            "COMMAND" | "CMD" | "META" => SpecialKey::Command,
            _ => return None,
        };
        Some(key)
    }

    /// Canonical display name
    pub fn name(&self) -> &'static str {
        match self {
            SpecialKey::Tab => "Tab",
            SpecialKey::Enter => "Enter",
            SpecialKey::Space => "Space",
            SpecialKey::Backspace => "Backspace",
            SpecialKey::Delete => "Delete",
            SpecialKey::Insert => "Insert",
            SpecialKey::Home => "Home",
            SpecialKey::End => "End",
            SpecialKey::PageUp => "PageUp",
            SpecialKey::PageDown => "PageDown",
            SpecialKey::Left => "Left",
            SpecialKey::Right => "Right",
            SpecialKey::Up => "Up",
            SpecialKey::Down => "Down",
            SpecialKey::Escape => "Escape",
            SpecialKey::F1 => "F1",
            SpecialKey::F2 => "F2",
            SpecialKey::F3 => "F3",
            SpecialKey::F4 => "F4",
            SpecialKey::F5 => "F5",
            SpecialKey::F6 => "F6",
            SpecialKey::F7 => "F7",
            SpecialKey::F8 => "F8",
            SpecialKey::F9 => "F9",
            SpecialKey::F10 => "F10",
            SpecialKey::F11 => "F11",
            SpecialKey::F12 => "F12",
            SpecialKey::Shift => "Shift",
            SpecialKey::Control => "Control",
            SpecialKey::Alt => "Alt",
            SpecialKey::Command => "Command",
        }
    }

    pub fn is_modifier(&self) -> bool {
        Self::MODIFIERS.contains(self)
    }
}

impl fmt::Display for SpecialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a compiled sequence
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Type the text character by character. Never empty.
    Text(String),
    KeyPress(SpecialKey),
    KeyDown(SpecialKey),
    KeyUp(SpecialKey),
    /// Pause for the given number of milliseconds
    Delay(u64),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Text(text) => write!(f, "Text(<{} chars>)", text.chars().count()),
            Action::KeyPress(key) => write!(f, "KeyPress({})", key),
            Action::KeyDown(key) => write!(f, "KeyDown({})", key),
            Action::KeyUp(key) => write!(f, "KeyUp({})", key),
            Action::Delay(ms) => write!(f, "Delay({}ms)", ms),
        }
    }
}

/// Ordered list of actions; insertion order is execution order
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompiledSequence {
    actions: Vec<Action>,
}

impl CompiledSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text, skipping empty strings
    pub fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.actions.push(Action::Text(text.to_owned()));
        }
    }

    pub fn push(&mut self, action: Action) {
        match action {
            Action::Text(text) => {
                let mut text = text;
                self.push_text(&text);
                text.zeroize();
            }
            other => self.actions.push(other),
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of explicit `Delay` actions
    pub fn total_delay_ms(&self) -> u64 {
        self.actions
            .iter()
            .map(|action| match action {
                Action::Delay(ms) => *ms,
                _ => 0,
            })
            .sum()
    }
}

impl Drop for CompiledSequence {
    fn drop(&mut self) {
        for action in &mut self.actions {
            if let Action::Text(text) = action {
                text.zeroize();
            }
        }
    }
}

impl<'a> IntoIterator for &'a CompiledSequence {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl FromIterator<Action> for CompiledSequence {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut sequence = CompiledSequence::new();
        for action in iter {
            sequence.push(action);
        }
        sequence
    }
}
