//! Keyboard encoding
//!
//! Programs see the keyboard as a single IO byte at $0020 holding at most
//! one pressed key as a bit flag; zero means no input. The byte is written
//! on press and cleared on release, so a held key stays visible to every
//! cycle until it is let go.

use serde::{Deserialize, Serialize};

pub const KEYBOARD_ADDR: u16 = 0x0020;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Action,
}

impl Key {
    pub const ALL: [Key; 5] = [Key::Up, Key::Down, Key::Left, Key::Right, Key::Action];

    /// Bit written to the keyboard byte while this key is held
    pub fn mask(self) -> u8 {
        match self {
            Key::Up => 0b0000_0001,
            Key::Down => 0b0000_0010,
            Key::Left => 0b0000_0100,
            Key::Right => 0b0000_1000,
            Key::Action => 0b0001_0000,
        }
    }

    /// Decode a keyboard byte; anything but a single known flag is no key
    pub fn from_mask(byte: u8) -> Option<Key> {
        Key::ALL.into_iter().find(|key| key.mask() == byte)
    }

    /// Parse a key name, accepting arrow and WASD spellings
    pub fn from_name(name: &str) -> Option<Key> {
        match name.to_lowercase().as_str() {
            "up" | "w" => Some(Key::Up),
            "down" | "s" => Some(Key::Down),
            "left" | "a" => Some(Key::Left),
            "right" | "d" => Some(Key::Right),
            "action" | "space" | "fire" => Some(Key::Action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_are_distinct_single_bits() {
        for key in Key::ALL {
            assert_eq!(key.mask().count_ones(), 1);
            assert_eq!(Key::from_mask(key.mask()), Some(key));
        }
        assert_eq!(Key::Up.mask(), 0x01);
        assert_eq!(Key::Action.mask(), 0x10);
    }

    #[test]
    fn test_from_mask_rejects_combinations() {
        assert_eq!(Key::from_mask(0x00), None);
        assert_eq!(Key::from_mask(0x03), None);
        assert_eq!(Key::from_mask(0x20), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Key::from_name("W"), Some(Key::Up));
        assert_eq!(Key::from_name("right"), Some(Key::Right));
        assert_eq!(Key::from_name("Space"), Some(Key::Action));
        assert_eq!(Key::from_name("enter"), None);
    }
}
