//! Command shell presented to every session.
//!
//! - `command`: command descriptors and the ordered command table
//! - `dispatch`: line parsing, command matching and handler invocation
//! - `builtin`: the stock `help`, `quit` and `test` commands

pub mod builtin;
pub mod command;
pub mod dispatch;

pub use command::{CommandContext, CommandDescriptor, CommandHandler, CommandTable};
pub use dispatch::{Outcome, Shell};

/// Recoverable shell errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellError {
    /// A command was registered with an empty name.
    EmptyName,
    /// The line holds neither a space nor a terminator.
    Malformed,
}

impl std::fmt::Display for ShellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellError::EmptyName => write!(f, "command name must not be empty"),
            ShellError::Malformed => write!(f, "malformed command line"),
        }
    }
}

impl std::error::Error for ShellError {}
