//! Scripted event source for deterministic tests.

use std::collections::VecDeque;
use std::io;

use super::{EventSource, OperatorEvent};

/// Replays a fixed sequence of operator events. Running past the end of
/// the script is a test bug and reads as an I/O error.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    script: VecDeque<OperatorEvent>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = OperatorEvent>) -> Self {
        Self {
            script: events.into_iter().collect(),
        }
    }

    /// Events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> io::Result<OperatorEvent> {
        self.script.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "operator script exhausted")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order() {
        let mut events = ScriptedEvents::new([OperatorEvent::Lower, OperatorEvent::Accept]);
        assert_eq!(events.next_event().unwrap(), OperatorEvent::Lower);
        assert_eq!(events.next_event().unwrap(), OperatorEvent::Accept);
        assert_eq!(events.remaining(), 0);
    }

    #[test]
    fn test_exhausted_script_is_an_error() {
        let mut events = ScriptedEvents::default();
        assert_eq!(
            events.next_event().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
