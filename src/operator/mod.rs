//! Operator input, abstracted so the state machine can be driven by a
//! keyboard in production and by a script in tests.

pub mod keyboard;
pub mod mock;

pub use keyboard::KeyboardEvents;
pub use mock::ScriptedEvents;

/// One keypress, already translated to its calibration meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorEvent {
    /// Digit key; starts or extends manual offset entry.
    Digit(char),
    /// Decimal point inside manual offset entry.
    Decimal,
    /// Move the candidate offset up by one step.
    Raise,
    /// Move the candidate offset down by one step.
    Lower,
    /// Enter increment editing.
    EditIncrement,
    /// Toggle the fine adjustment step.
    FineTune,
    /// Lift the nozzle and repeat the drag test at the same offset.
    Retest,
    /// Show the key reference.
    Help,
    /// Accept the current value.
    Accept,
    /// Abandon the session.
    Quit,
    /// Cancel manual entry.
    Cancel,
}

/// Blocking source of operator events.
pub trait EventSource {
    /// Block until the operator produces an event.
    fn next_event(&mut self) -> std::io::Result<OperatorEvent>;
}
