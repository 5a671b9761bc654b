use crate::utils::window_geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Код клавиши, нумерация evdev
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const ESCAPE: KeyCode = KeyCode(1);

    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KEY_{}", self.0)
    }
}

/// Сырой ввод, который окно получает, пока оно источник перетаскивания.
///
/// Координаты указателя экранные.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerMoved { screen: Point },
    PointerReleased { screen: Point },
    Key { code: KeyCode, state: KeyState },
}

impl InputEvent {
    pub fn moved(x: i32, y: i32) -> Self {
        InputEvent::PointerMoved {
            screen: Point::new(x, y),
        }
    }

    pub fn released(x: i32, y: i32) -> Self {
        InputEvent::PointerReleased {
            screen: Point::new(x, y),
        }
    }

    pub fn key_down(code: KeyCode) -> Self {
        InputEvent::Key {
            code,
            state: KeyState::Pressed,
        }
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::PointerMoved { screen } => write!(f, "move {}", screen),
            InputEvent::PointerReleased { screen } => write!(f, "release {}", screen),
            InputEvent::Key { code, state } => write!(f, "{} {:?}", code, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_code_display() {
        assert_eq!(KeyCode::ESCAPE.to_string(), "KEY_1");
        assert_eq!(KeyCode::new(28).value(), 28);
    }

    #[test]
    fn test_input_constructors() {
        assert_eq!(
            InputEvent::moved(3, 4),
            InputEvent::PointerMoved {
                screen: Point::new(3, 4)
            }
        );
        assert_eq!(
            InputEvent::key_down(KeyCode::ESCAPE),
            InputEvent::Key {
                code: KeyCode(1),
                state: KeyState::Pressed
            }
        );
    }
}
