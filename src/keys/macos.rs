//! macOS virtual key codes for the ANSI (US) layout
//!
//! Values follow the `kVK_*` constants from `HIToolbox/Events.h`.

use super::{KeyCodeTable, NativeKeyCode};
use crate::sequence::SpecialKey;

const SPECIALS: &[(SpecialKey, NativeKeyCode)] = &[
    (SpecialKey::Tab, 0x30),
    (SpecialKey::Enter, 0x24),
    (SpecialKey::Space, 0x31),
    (SpecialKey::Backspace, 0x33),
    (SpecialKey::Delete, 0x75),
    // kVK_Help sits where Insert is on PC keyboards
    (SpecialKey::Insert, 0x72),
    (SpecialKey::Home, 0x73),
    (SpecialKey::End, 0x77),
    (SpecialKey::PageUp, 0x74),
    (SpecialKey::PageDown, 0x79),
    (SpecialKey::Left, 0x7B),
    (SpecialKey::Right, 0x7C),
    (SpecialKey::Down, 0x7D),
    (SpecialKey::Up, 0x7E),
    (SpecialKey::Escape, 0x35),
    (SpecialKey::F1, 0x7A),
    (SpecialKey::F2, 0x78),
    (SpecialKey::F3, 0x63),
    (SpecialKey::F4, 0x76),
    (SpecialKey::F5, 0x60),
    (SpecialKey::F6, 0x61),
    (SpecialKey::F7, 0x62),
    (SpecialKey::F8, 0x64),
    (SpecialKey::F9, 0x65),
    (SpecialKey::F10, 0x6D),
    (SpecialKey::F11, 0x67),
    (SpecialKey::F12, 0x6F),
    (SpecialKey::Shift, 0x38),
    (SpecialKey::Control, 0x3B),
    (SpecialKey::Alt, 0x3A),
    (SpecialKey::Command, 0x37),
];

const CHARS: &[(char, char, NativeKeyCode)] = &[
    ('a', 'A', 0x00),
    ('s', 'S', 0x01),
    ('d', 'D', 0x02),
    ('f', 'F', 0x03),
    ('h', 'H', 0x04),
    ('g', 'G', 0x05),
    ('z', 'Z', 0x06),
    ('x', 'X', 0x07),
    ('c', 'C', 0x08),
    ('v', 'V', 0x09),
    ('b', 'B', 0x0B),
    ('q', 'Q', 0x0C),
    ('w', 'W', 0x0D),
    ('e', 'E', 0x0E),
    ('r', 'R', 0x0F),
    ('y', 'Y', 0x10),
    ('t', 'T', 0x11),
    ('1', '!', 0x12),
    ('2', '@', 0x13),
    ('3', '#', 0x14),
    ('4', '$', 0x15),
    ('6', '^', 0x16),
    ('5', '%', 0x17),
    ('=', '+', 0x18),
    ('9', '(', 0x19),
    ('7', '&', 0x1A),
    ('-', '_', 0x1B),
    ('8', '*', 0x1C),
    ('0', ')', 0x1D),
    (']', '}', 0x1E),
    ('o', 'O', 0x1F),
    ('u', 'U', 0x20),
    ('[', '{', 0x21),
    ('i', 'I', 0x22),
    ('p', 'P', 0x23),
    ('l', 'L', 0x25),
    ('j', 'J', 0x26),
    ('\'', '"', 0x27),
    ('k', 'K', 0x28),
    (';', ':', 0x29),
    ('\\', '|', 0x2A),
    (',', '<', 0x2B),
    ('/', '?', 0x2C),
    ('n', 'N', 0x2D),
    ('m', 'M', 0x2E),
    ('.', '>', 0x2F),
    (' ', ' ', 0x31),
    ('`', '~', 0x32),
];

pub static MAC_ANSI: KeyCodeTable = KeyCodeTable::new("macos-ansi", SPECIALS, CHARS);
