//! Parsing of operator input lines into outbound messages.

use sensorlink_protocol::ControlCommand;
use serde_json::Value;

/// What to do with one line read from stdin.
#[derive(Debug, PartialEq)]
pub enum InputLine {
    /// Nothing to send.
    Empty,
    /// Send this JSON value.
    Message(Value),
    /// Not JSON and not a known shorthand.
    Invalid(String),
}

/// Parse a line as either a JSON message or a command shorthand:
/// `start`, `stop`, `program <name>`.
pub fn parse_line(line: &str) -> InputLine {
    let line = line.trim();
    if line.is_empty() {
        return InputLine::Empty;
    }

    if line.starts_with('{') || line.starts_with('[') {
        return match serde_json::from_str(line) {
            Ok(value) => InputLine::Message(value),
            Err(e) => InputLine::Invalid(format!("invalid JSON: {}", e)),
        };
    }

    let command = match line.split_once(char::is_whitespace) {
        None if line.eq_ignore_ascii_case("start") => ControlCommand::Start,
        None if line.eq_ignore_ascii_case("stop") => ControlCommand::Stop,
        Some((word, name)) if word.eq_ignore_ascii_case("program") => {
            ControlCommand::program(name.trim())
        }
        _ => return InputLine::Invalid(format!("unknown command '{}'", line)),
    };

    match serde_json::to_value(&command) {
        Ok(value) => InputLine::Message(value),
        Err(e) => InputLine::Invalid(e.to_string()),
    }
}
