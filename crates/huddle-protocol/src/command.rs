//! Classification of decoded lines.
//!
//! A line is classified once, right after decoding, into one of three
//! commands. Priority order: exit, then whisper, then broadcast.

use huddle_core::SessionName;

/// Literal token that ends a session.
pub const EXIT_COMMAND: &str = "!exit";

/// Prefix marking a line as a whisper.
pub const WHISPER_PREFIX: char = '@';

/// What a decoded line asks the router to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Notify everyone else, then close the sender's session.
    Exit,

    /// Deliver to exactly one named session.
    Whisper {
        /// Text between `@` and the first space
        target: SessionName,
    },

    /// Deliver to every other session.
    Broadcast,
}

impl Command {
    /// Classifies a line with its terminator already removed.
    ///
    /// Returns `None` for lines that carry nothing to route: an empty line,
    /// or an `@name` line with no space after the name. The latter is
    /// dropped rather than broadcast so an unfinished whisper never reaches
    /// the whole room.
    pub fn parse(line: &str) -> Option<Self> {
        if line.is_empty() {
            return None;
        }

        if line == EXIT_COMMAND {
            return Some(Self::Exit);
        }

        if let Some(rest) = line.strip_prefix(WHISPER_PREFIX) {
            let (target, _) = rest.split_once(' ')?;
            return Some(Self::Whisper {
                target: SessionName::new(target),
            });
        }

        Some(Self::Broadcast)
    }

    /// Returns true for the exit command.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Whisper { .. } => "whisper",
            Self::Broadcast => "broadcast",
        }
    }
}
