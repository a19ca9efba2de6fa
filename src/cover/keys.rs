//! Keyboard input
//!
//! Keys are identified by DOM-style codes (`KeyP`, `Digit1`, `Backquote`,
//! `Escape`, `F1`). Bare characters such as `p` or `` ` `` are accepted on
//! input and normalised to the same key.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VeilError;

// ============================================================================
// Key
// ============================================================================

/// A physical key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Key {
    Escape,
    Backquote,
    Space,
    Enter,
    Tab,
    /// `A`..`Z`, stored upper-case
    Letter(char),
    /// `0`..`9`
    Digit(u8),
    /// `F1`..`F24`
    Function(u8),
    /// Anything else, kept verbatim
    Other(String),
}

impl Key {
    /// Parse a DOM key code or a bare key name
    ///
    /// # Example
    /// ```
    /// use veil::cover::Key;
    /// assert_eq!(Key::parse("KeyP"), Key::Letter('P'));
    /// assert_eq!(Key::parse("p"), Key::Letter('P'));
    /// assert_eq!(Key::parse("`"), Key::Backquote);
    /// ```
    pub fn parse(code: &str) -> Key {
        let code = code.trim_matches(|c: char| c == '\n' || c == '\r' || c == '\t');

        match code {
            "Escape" | "Esc" | "escape" | "esc" => return Key::Escape,
            "Backquote" | "`" | "backquote" => return Key::Backquote,
            "Space" | " " | "space" => return Key::Space,
            "Enter" | "enter" | "Return" => return Key::Enter,
            "Tab" | "tab" => return Key::Tab,
            _ => {}
        }

        if let Some(letter) = code.strip_prefix("Key").and_then(single_letter) {
            return Key::Letter(letter);
        }
        if let Some(letter) = single_letter(code) {
            return Key::Letter(letter);
        }

        if let Some(digit) = code.strip_prefix("Digit").and_then(single_digit) {
            return Key::Digit(digit);
        }
        if let Some(digit) = single_digit(code) {
            return Key::Digit(digit);
        }

        if let Some(n) = code
            .strip_prefix('F')
            .or_else(|| code.strip_prefix('f'))
            .and_then(|n| n.parse::<u8>().ok())
        {
            if (1..=24).contains(&n) {
                return Key::Function(n);
            }
        }

        Key::Other(code.to_string())
    }
}

fn single_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}

fn single_digit(s: &str) -> Option<u8> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).map(|d| d as u8),
        _ => None,
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Escape => write!(f, "Escape"),
            Key::Backquote => write!(f, "Backquote"),
            Key::Space => write!(f, "Space"),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::Letter(c) => write!(f, "Key{}", c),
            Key::Digit(d) => write!(f, "Digit{}", d),
            Key::Function(n) => write!(f, "F{}", n),
            Key::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for Key {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Key::parse(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::parse(&s)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

// ============================================================================
// Trigger Key
// ============================================================================

/// Keys the user may choose as the cover trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerKey {
    #[default]
    Escape,
    Space,
    KeyP,
    KeyQ,
    KeyX,
    KeyZ,
    F1,
    F2,
    F12,
}

impl TriggerKey {
    /// Every selectable trigger, in menu order
    pub const ALL: [TriggerKey; 9] = [
        TriggerKey::Escape,
        TriggerKey::Space,
        TriggerKey::KeyP,
        TriggerKey::KeyQ,
        TriggerKey::KeyX,
        TriggerKey::KeyZ,
        TriggerKey::F1,
        TriggerKey::F2,
        TriggerKey::F12,
    ];

    /// The physical key this trigger listens for
    pub fn key(self) -> Key {
        match self {
            TriggerKey::Escape => Key::Escape,
            TriggerKey::Space => Key::Space,
            TriggerKey::KeyP => Key::Letter('P'),
            TriggerKey::KeyQ => Key::Letter('Q'),
            TriggerKey::KeyX => Key::Letter('X'),
            TriggerKey::KeyZ => Key::Letter('Z'),
            TriggerKey::F1 => Key::Function(1),
            TriggerKey::F2 => Key::Function(2),
            TriggerKey::F12 => Key::Function(12),
        }
    }

    /// Trigger for a physical key, if it is selectable
    pub fn from_key(key: &Key) -> Option<TriggerKey> {
        TriggerKey::ALL.into_iter().find(|t| &t.key() == key)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for TriggerKey {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKey::from_key(&Key::parse(s)).ok_or_else(|| VeilError::UnknownKey { key: s.to_string() })
    }
}

impl TryFrom<String> for TriggerKey {
    type Error = VeilError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TriggerKey> for String {
    fn from(trigger: TriggerKey) -> Self {
        trigger.to_string()
    }
}

// ============================================================================
// Key Event
// ============================================================================

/// One raw keyboard event from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    /// Key-down (true) or key-up (false)
    pub pressed: bool,
    /// Generated by auto-repeat while the key is held
    pub repeat: bool,
}

impl KeyEvent {
    /// A discrete key-down
    pub fn down(key: Key) -> Self {
        Self {
            key,
            pressed: true,
            repeat: false,
        }
    }

    /// An auto-repeat key-down
    pub fn repeat(key: Key) -> Self {
        Self {
            key,
            pressed: true,
            repeat: true,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            pressed: false,
            repeat: false,
        }
    }

    /// Only discrete key-downs drive cover transitions
    pub fn is_discrete_press(&self) -> bool {
        self.pressed && !self.repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("KeyP", Key::Letter('P'))]
    #[test_case("P", Key::Letter('P'))]
    #[test_case("p", Key::Letter('P'))]
    #[test_case("Backquote", Key::Backquote)]
    #[test_case("`", Key::Backquote)]
    #[test_case("Escape", Key::Escape)]
    #[test_case("Esc", Key::Escape)]
    #[test_case("Space", Key::Space)]
    #[test_case("Digit7", Key::Digit(7))]
    #[test_case("7", Key::Digit(7))]
    #[test_case("F12", Key::Function(12))]
    #[test_case("F99", Key::Other("F99".to_string()))]
    #[test_case("ArrowUp", Key::Other("ArrowUp".to_string()))]
    fn test_parse(code: &str, expected: Key) {
        assert_eq!(Key::parse(code), expected);
    }

    #[test]
    fn test_display_round_trip() {
        for code in ["KeyP", "Backquote", "Escape", "Digit3", "F4", "ArrowLeft"] {
            assert_eq!(Key::parse(code).to_string(), code);
        }
    }

    #[test]
    fn test_trigger_keys_parse() {
        for trigger in TriggerKey::ALL {
            assert_eq!(trigger.to_string().parse::<TriggerKey>().unwrap(), trigger);
        }
        assert_eq!("p".parse::<TriggerKey>().unwrap(), TriggerKey::KeyP);
        assert!(matches!(
            "Backquote".parse::<TriggerKey>(),
            Err(VeilError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_trigger_serde() {
        let json = serde_json::to_string(&TriggerKey::KeyP).unwrap();
        assert_eq!(json, "\"KeyP\"");
        let back: TriggerKey = serde_json::from_str("\"F2\"").unwrap();
        assert_eq!(back, TriggerKey::F2);
        assert!(serde_json::from_str::<TriggerKey>("\"KeyA\"").is_err());

        let key: Key = serde_json::from_str("\"`\"").unwrap();
        assert_eq!(key, Key::Backquote);
    }

    #[test]
    fn test_discrete_press() {
        assert!(KeyEvent::down(Key::Escape).is_discrete_press());
        assert!(!KeyEvent::repeat(Key::Escape).is_discrete_press());
        assert!(!KeyEvent::up(Key::Escape).is_discrete_press());
    }
}
