//! Windows virtual-key codes for the US layout

use super::{KeyCodeTable, NativeKeyCode};
use crate::sequence::SpecialKey;

const SPECIALS: &[(SpecialKey, NativeKeyCode)] = &[
    (SpecialKey::Tab, 0x09),
    (SpecialKey::Enter, 0x0D),
    (SpecialKey::Space, 0x20),
    (SpecialKey::Backspace, 0x08),
    (SpecialKey::Delete, 0x2E),
    (SpecialKey::Insert, 0x2D),
    (SpecialKey::Home, 0x24),
    (SpecialKey::End, 0x23),
    (SpecialKey::PageUp, 0x21),
    (SpecialKey::PageDown, 0x22),
    (SpecialKey::Left, 0x25),
    (SpecialKey::Up, 0x26),
    (SpecialKey::Right, 0x27),
    (SpecialKey::Down, 0x28),
    (SpecialKey::Escape, 0x1B),
    (SpecialKey::F1, 0x70),
    (SpecialKey::F2, 0x71),
    (SpecialKey::F3, 0x72),
    (SpecialKey::F4, 0x73),
    (SpecialKey::F5, 0x74),
    (SpecialKey::F6, 0x75),
    (SpecialKey::F7, 0x76),
    (SpecialKey::F8, 0x77),
    (SpecialKey::F9, 0x78),
    (SpecialKey::F10, 0x79),
    (SpecialKey::F11, 0x7A),
    (SpecialKey::F12, 0x7B),
    (SpecialKey::Shift, 0x10),
    (SpecialKey::Control, 0x11),
    // VK_MENU
    (SpecialKey::Alt, 0x12),
    // VK_LWIN
    (SpecialKey::Command, 0x5B),
];

const CHARS: &[(char, char, NativeKeyCode)] = &[
    (' ', ' ', 0x20),
    ('0', ')', 0x30),
    ('1', '!', 0x31),
    ('2', '@', 0x32),
    ('3', '#', 0x33),
    ('4', '$', 0x34),
    ('5', '%', 0x35),
    ('6', '^', 0x36),
    ('7', '&', 0x37),
    ('8', '*', 0x38),
    ('9', '(', 0x39),
    ('a', 'A', 0x41),
    ('b', 'B', 0x42),
    ('c', 'C', 0x43),
    ('d', 'D', 0x44),
    ('e', 'E', 0x45),
    ('f', 'F', 0x46),
    ('g', 'G', 0x47),
    ('h', 'H', 0x48),
    ('i', 'I', 0x49),
    ('j', 'J', 0x4A),
    ('k', 'K', 0x4B),
    ('l', 'L', 0x4C),
    ('m', 'M', 0x4D),
    ('n', 'N', 0x4E),
    ('o', 'O', 0x4F),
    ('p', 'P', 0x50),
    ('q', 'Q', 0x51),
    ('r', 'R', 0x52),
    ('s', 'S', 0x53),
    ('t', 'T', 0x54),
    ('u', 'U', 0x55),
    ('v', 'V', 0x56),
    ('w', 'W', 0x57),
    ('x', 'X', 0x58),
    ('y', 'Y', 0x59),
    ('z', 'Z', 0x5A),
    // VK_OEM_*
    (';', ':', 0xBA),
    ('=', '+', 0xBB),
    (',', '<', 0xBC),
    ('-', '_', 0xBD),
    ('.', '>', 0xBE),
    ('/', '?', 0xBF),
    ('`', '~', 0xC0),
    ('[', '{', 0xDB),
    ('\\', '|', 0xDC),
    (']', '}', 0xDD),
    ('\'', '"', 0xDE),
];

/// Navigation keys that need `KEYEVENTF_EXTENDEDKEY` when synthesized
pub const EXTENDED_KEYS: &[NativeKeyCode] = &[
    0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x2D, 0x2E, 0x5B,
];

pub static WINDOWS_US: KeyCodeTable = KeyCodeTable::new("windows-us", SPECIALS, CHARS);
