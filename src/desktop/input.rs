//! Keyboard and mouse injection
//!
//! Input is global to the desktop, so everything here takes `&mut self` and
//! callers are expected to re-focus their target before each call.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use super::types::Point;
use crate::error::ExportError;

/// Settle time between pressing modifiers and the final key
const CHORD_SETTLE: Duration = Duration::from_millis(20);

/// Keys the workflows use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Printable character, sent as its lowercase form
    Char(char),

    // Function keys
    F(u8),

    // Modifiers
    Control,
    Alt,
    Shift,

    // Navigation
    Up,
    Down,
    Left,
    Right,
    Home,
    End,

    // Editing
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    Space,
}

impl KeyCode {
    pub fn is_modifier(self) -> bool {
        matches!(self, KeyCode::Control | KeyCode::Alt | KeyCode::Shift)
    }

    fn to_enigo(self) -> Key {
        match self {
            KeyCode::Char(c) => Key::Unicode(c),
            KeyCode::F(n) => match n {
                1 => Key::F1,
                2 => Key::F2,
                3 => Key::F3,
                4 => Key::F4,
                5 => Key::F5,
                6 => Key::F6,
                7 => Key::F7,
                8 => Key::F8,
                9 => Key::F9,
                10 => Key::F10,
                11 => Key::F11,
                _ => Key::F12,
            },
            KeyCode::Control => Key::Control,
            KeyCode::Alt => Key::Alt,
            KeyCode::Shift => Key::Shift,
            KeyCode::Up => Key::UpArrow,
            KeyCode::Down => Key::DownArrow,
            KeyCode::Left => Key::LeftArrow,
            KeyCode::Right => Key::RightArrow,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Enter => Key::Return,
            KeyCode::Tab => Key::Tab,
            KeyCode::Escape => Key::Escape,
            KeyCode::Space => Key::Space,
        }
    }

    /// Parse a key name, case-insensitive (`a`, `ctrl`, `enter`, `f4`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() || c.is_ascii_punctuation() {
                return Some(KeyCode::Char(c));
            }
        }
        match lower.as_str() {
            "ctrl" | "control" => Some(KeyCode::Control),
            "alt" => Some(KeyCode::Alt),
            "shift" => Some(KeyCode::Shift),
            "up" => Some(KeyCode::Up),
            "down" => Some(KeyCode::Down),
            "left" => Some(KeyCode::Left),
            "right" => Some(KeyCode::Right),
            "home" => Some(KeyCode::Home),
            "end" => Some(KeyCode::End),
            "backspace" | "bs" => Some(KeyCode::Backspace),
            "delete" | "del" => Some(KeyCode::Delete),
            "enter" | "return" => Some(KeyCode::Enter),
            "tab" => Some(KeyCode::Tab),
            "escape" | "esc" => Some(KeyCode::Escape),
            "space" => Some(KeyCode::Space),
            f if f.starts_with('f') => match f[1..].parse::<u8>() {
                Ok(n @ 1..=12) => Some(KeyCode::F(n)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::F(n) => write!(f, "f{}", n),
            KeyCode::Control => f.write_str("ctrl"),
            KeyCode::Alt => f.write_str("alt"),
            KeyCode::Shift => f.write_str("shift"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::Escape => f.write_str("esc"),
            KeyCode::Space => f.write_str("space"),
        }
    }
}

/// Keys pressed together, in press order (`ctrl+shift+s`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord(Vec<KeyCode>);

impl KeyChord {
    pub fn single(key: KeyCode) -> Self {
        Self(vec![key])
    }

    pub fn keys(&self) -> &[KeyCode] {
        &self.0
    }
}

impl FromStr for KeyChord {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A lone "+" is the plus key, not a separator
        if s.trim() == "+" {
            return Ok(Self::single(KeyCode::Char('+')));
        }
        let keys = s
            .split('+')
            .map(|part| {
                KeyCode::parse(part)
                    .ok_or_else(|| ExportError::InvalidArgument(format!("unknown key `{}` in `{}`", part, s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if keys.is_empty() {
            return Err(ExportError::InvalidArgument("empty key chord".to_string()));
        }
        Ok(Self(keys))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(KeyCode::to_string).collect();
        f.write_str(&names.join("+"))
    }
}

/// Mouse button types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    fn to_enigo(self) -> Button {
        match self {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        }
    }
}

/// Raw input primitives
pub trait InputBackend {
    fn key_down(&mut self, key: KeyCode) -> Result<()>;
    fn key_up(&mut self, key: KeyCode) -> Result<()>;
    /// Type literal text in one call
    fn text(&mut self, text: &str) -> Result<()>;
    /// Absolute mouse move
    fn move_mouse(&mut self, to: Point) -> Result<()>;
    /// Click at the current mouse position
    fn click(&mut self, button: MouseButton) -> Result<()>;
}

/// enigo-backed input for the real desktop
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("Failed to create input controller: {:?}", e))?;
        Ok(Self { enigo })
    }
}

impl InputBackend for EnigoBackend {
    fn key_down(&mut self, key: KeyCode) -> Result<()> {
        self.enigo
            .key(key.to_enigo(), Direction::Press)
            .map_err(|e| anyhow::anyhow!("Failed to press {}: {:?}", key, e))
    }

    fn key_up(&mut self, key: KeyCode) -> Result<()> {
        self.enigo
            .key(key.to_enigo(), Direction::Release)
            .map_err(|e| anyhow::anyhow!("Failed to release {}: {:?}", key, e))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.enigo
            .text(text)
            .map_err(|e| anyhow::anyhow!("Failed to type text: {:?}", e))
    }

    fn move_mouse(&mut self, to: Point) -> Result<()> {
        self.enigo
            .move_mouse(to.x, to.y, Coordinate::Abs)
            .map_err(|e| anyhow::anyhow!("Failed to move mouse: {:?}", e))
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.enigo
            .button(button.to_enigo(), Direction::Click)
            .map_err(|e| anyhow::anyhow!("Failed to click: {:?}", e))
    }
}

/// Chord, text and mouse sequences on top of an [`InputBackend`]
pub struct InputInjector {
    backend: Box<dyn InputBackend>,
}

impl InputInjector {
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        Self { backend }
    }

    // ============ Keyboard ============

    /// Press `chord` `repeat` times, sleeping `delay` after each.
    /// Keys go down in order and come up in reverse.
    pub fn send_keys(&mut self, chord: &KeyChord, repeat: u32, delay: Duration) -> Result<()> {
        tracing::debug!("Sending {} x{}", chord, repeat);
        for _ in 0..repeat {
            self.chord(chord)?;
            thread::sleep(delay);
        }
        Ok(())
    }

    fn chord(&mut self, chord: &KeyChord) -> Result<()> {
        let keys = chord.keys();
        let mut pressed = 0;
        let mut result = Ok(());
        for (i, key) in keys.iter().enumerate() {
            if let Err(e) = self.backend.key_down(*key) {
                result = Err(e);
                break;
            }
            pressed += 1;
            if keys.len() > 1 && i + 2 == keys.len() {
                thread::sleep(CHORD_SETTLE);
            }
        }
        // Always release what went down, even after a failure
        for key in keys[..pressed].iter().rev() {
            let released = self.backend.key_up(*key);
            if result.is_ok() {
                result = released;
            }
        }
        result
    }

    /// Type `text` `repeat` times. With `char_at_a_time` each character is a
    /// separate injection followed by `delay`, which some fields need to keep
    /// up with their autocomplete.
    pub fn send_text(&mut self, text: &str, char_at_a_time: bool, repeat: u32, delay: Duration) -> Result<()> {
        for _ in 0..repeat {
            if char_at_a_time {
                let mut buf = [0u8; 4];
                for c in text.chars() {
                    self.backend.text(c.encode_utf8(&mut buf))?;
                    thread::sleep(delay);
                }
            } else {
                self.backend.text(text)?;
                thread::sleep(delay);
            }
        }
        Ok(())
    }

    // ============ Mouse ============

    /// Move to `point`, optionally left-clicking there
    pub fn mouse(&mut self, point: Point, click: bool) -> Result<()> {
        self.backend.move_mouse(point)?;
        if click {
            thread::sleep(Duration::from_millis(50));
            self.backend.click(MouseButton::Left)?;
        }
        Ok(())
    }
}
