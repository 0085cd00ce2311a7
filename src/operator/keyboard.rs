//! Keyboard-backed event source.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use super::{EventSource, OperatorEvent};

/// Reads raw keystrokes from the controlling terminal. Raw mode is held
/// only while blocked on a key so prompts printed between keys render
/// normally.
#[derive(Debug, Default)]
pub struct KeyboardEvents;

impl KeyboardEvents {
    pub fn new() -> Self {
        Self
    }
}

/// Restores cooked mode when dropped, error paths included.
struct RawModeGuard;

impl RawModeGuard {
    fn hold() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl EventSource for KeyboardEvents {
    fn next_event(&mut self) -> io::Result<OperatorEvent> {
        let _raw = RawModeGuard::hold()?;
        loop {
            if let Event::Key(key) = event::read()? {
                if let Some(mapped) = map_key(key) {
                    return Ok(mapped);
                }
            }
        }
    }
}

fn map_key(key: KeyEvent) -> Option<OperatorEvent> {
    // Windows consoles and kitty terminals also deliver repeats and releases.
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(digit @ '0'..='9') => Some(OperatorEvent::Digit(digit)),
        KeyCode::Char('.') => Some(OperatorEvent::Decimal),
        // '=' shares the '+' key; accept it unshifted.
        KeyCode::Char('+') | KeyCode::Char('=') => Some(OperatorEvent::Raise),
        KeyCode::Char('-') => Some(OperatorEvent::Lower),
        KeyCode::Up | KeyCode::Down => Some(OperatorEvent::EditIncrement),
        KeyCode::Char('f') => Some(OperatorEvent::FineTune),
        KeyCode::Char('r') => Some(OperatorEvent::Retest),
        KeyCode::Char('h') => Some(OperatorEvent::Help),
        KeyCode::Enter => Some(OperatorEvent::Accept),
        KeyCode::Char('q') => Some(OperatorEvent::Quit),
        KeyCode::Esc => Some(OperatorEvent::Cancel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    fn key_with_kind(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_key_map() {
        assert_eq!(
            map_key(key(KeyCode::Char('7'))),
            Some(OperatorEvent::Digit('7'))
        );
        assert_eq!(
            map_key(key(KeyCode::Char('.'))),
            Some(OperatorEvent::Decimal)
        );
        assert_eq!(map_key(key(KeyCode::Char('+'))), Some(OperatorEvent::Raise));
        assert_eq!(map_key(key(KeyCode::Char('='))), Some(OperatorEvent::Raise));
        assert_eq!(map_key(key(KeyCode::Char('-'))), Some(OperatorEvent::Lower));
        assert_eq!(
            map_key(key(KeyCode::Up)),
            Some(OperatorEvent::EditIncrement)
        );
        assert_eq!(
            map_key(key(KeyCode::Down)),
            Some(OperatorEvent::EditIncrement)
        );
        assert_eq!(
            map_key(key(KeyCode::Char('f'))),
            Some(OperatorEvent::FineTune)
        );
        assert_eq!(
            map_key(key(KeyCode::Char('r'))),
            Some(OperatorEvent::Retest)
        );
        assert_eq!(map_key(key(KeyCode::Char('h'))), Some(OperatorEvent::Help));
        assert_eq!(map_key(key(KeyCode::Enter)), Some(OperatorEvent::Accept));
        assert_eq!(map_key(key(KeyCode::Char('q'))), Some(OperatorEvent::Quit));
        assert_eq!(map_key(key(KeyCode::Esc)), Some(OperatorEvent::Cancel));
        assert_eq!(map_key(key(KeyCode::Char('x'))), None);
        assert_eq!(map_key(key(KeyCode::Tab)), None);
    }

    #[test]
    fn test_releases_and_repeats_do_not_map() {
        let release = key_with_kind(KeyCode::Char('+'), KeyEventKind::Release);
        assert_eq!(map_key(release), None);
        let repeat = key_with_kind(KeyCode::Char('5'), KeyEventKind::Repeat);
        assert_eq!(map_key(repeat), None);
        // The same keys act when actually pressed.
        assert_eq!(map_key(key(KeyCode::Char('+'))), Some(OperatorEvent::Raise));
        assert_eq!(
            map_key(key(KeyCode::Char('5'))),
            Some(OperatorEvent::Digit('5'))
        );
    }
}
