//! A decoded line bound to the session that sent it.

use std::fmt;

use huddle_core::SessionName;

use crate::command::Command;

/// One routed chat line.
///
/// Produced once per decoded line and consumed once by the router.
/// Every delivery of a message carries the same payload: the sender's
/// name, a colon and a space, then the original line verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: SessionName,
    line: String,
    command: Command,
}

impl Message {
    /// Classifies `line` on behalf of `sender`.
    ///
    /// Returns `None` for lines that carry nothing to route.
    pub fn parse(sender: SessionName, line: impl Into<String>) -> Option<Self> {
        let line = line.into();
        let command = Command::parse(&line)?;
        Some(Self {
            sender,
            line,
            command,
        })
    }

    pub fn sender(&self) -> &SessionName {
        &self.sender
    }

    /// The line as received, without its terminator.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Formats the payload written to recipients (terminator not included).
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.line)
    }
}
