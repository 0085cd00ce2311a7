//! Scripted transport for deterministic tests.

use std::collections::VecDeque;
use std::time::Duration;

use super::{Transport, TransportError, TransportResult};

/// One scripted read outcome.
#[derive(Debug, Clone)]
enum ScriptedRead {
    Line(String),
    TimeOut,
}

/// Transport double that replays scripted response lines and records every
/// line written to it. An exhausted script reads as a deadline expiry, the
/// same thing a silent device produces.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: VecDeque<ScriptedRead>,
    writes: Vec<String>,
    deadline: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one response line to the script.
    pub fn push_line(&mut self, line: &str) {
        self.script.push_back(ScriptedRead::Line(line.to_string()));
    }

    /// Append several response lines to the script.
    pub fn push_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            self.push_line(line);
        }
    }

    /// Append `count` acknowledgement lines.
    pub fn push_acks(&mut self, count: usize) {
        for _ in 0..count {
            self.push_line("ok");
        }
    }

    /// Append one read-deadline expiry.
    pub fn push_timeout(&mut self) {
        self.script.push_back(ScriptedRead::TimeOut);
    }

    /// Builder form of [`push_lines`](Self::push_lines).
    pub fn with_lines<'a>(mut self, lines: impl IntoIterator<Item = &'a str>) -> Self {
        self.push_lines(lines);
        self
    }

    /// Every line written so far, in order, without wire terminators.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    /// Scripted reads not yet consumed.
    pub fn reads_remaining(&self) -> usize {
        self.script.len()
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &str) -> TransportResult<()> {
        self.writes.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> TransportResult<String> {
        match self.script.pop_front() {
            Some(ScriptedRead::Line(line)) => Ok(line),
            Some(ScriptedRead::TimeOut) | None => Err(TransportError::TimedOut {
                deadline: self.deadline,
            }),
        }
    }

    fn set_read_deadline(&mut self, deadline: Duration) -> TransportResult<()> {
        self.deadline = deadline;
        Ok(())
    }

    fn read_deadline(&self) -> Duration {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_lines_in_order_and_records_writes() {
        let mut transport = MockTransport::new().with_lines(["ok", "T:20 /0 B:20 /0 @:0 B@:0"]);
        transport.write_line("M115").unwrap();
        assert_eq!(transport.read_line().unwrap(), "ok");
        assert_eq!(transport.read_line().unwrap(), "T:20 /0 B:20 /0 @:0 B@:0");
        assert_eq!(transport.writes(), ["M115".to_string()]);
    }

    #[test]
    fn test_scripted_timeout_then_line() {
        let mut transport = MockTransport::new();
        transport.push_timeout();
        transport.push_line("ok");
        assert!(matches!(
            transport.read_line(),
            Err(TransportError::TimedOut { .. })
        ));
        assert_eq!(transport.read_line().unwrap(), "ok");
    }

    #[test]
    fn test_exhausted_script_reads_as_timeout() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.read_line(),
            Err(TransportError::TimedOut { .. })
        ));
        assert_eq!(transport.reads_remaining(), 0);
    }
}
