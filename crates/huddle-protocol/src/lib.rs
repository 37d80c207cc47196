//! Huddle Protocol - Newline-delimited chat wire protocol
//!
//! This crate provides the framing and message types shared by the
//! daemon and its tests:
//! - `codec` - `LineCodec`, which turns a fragmented byte stream into lines
//! - `command` - classification of a decoded line (exit, whisper, broadcast)
//! - `message` - a classified line bound to its sender, plus delivery rendering

pub mod codec;
pub mod command;
pub mod message;

pub use codec::{CodecError, LineCodec, DEFAULT_MAX_LINE_LENGTH};
pub use command::{Command, EXIT_COMMAND, WHISPER_PREFIX};
pub use message::Message;
