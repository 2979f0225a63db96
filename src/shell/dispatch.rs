//! Command dispatch.
//!
//! Turns one received line into a handler invocation and decides whether the
//! session survives it.

use super::command::{CommandContext, CommandTable};
use super::ShellError;
use std::fmt;
use tracing::debug;

/// What the session should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Close,
}

impl Outcome {
    /// Map a handler status code. Only `0` keeps the session.
    pub fn from_status(status: i32) -> Self {
        if status == 0 {
            Outcome::Continue
        } else {
            Outcome::Close
        }
    }
}

/// Command table plus the prompt shown after every line.
pub struct Shell {
    commands: CommandTable,
    prompt: String,
}

impl Shell {
    pub fn new(commands: CommandTable, prompt: impl Into<String>) -> Self {
        Self {
            commands,
            prompt: prompt.into(),
        }
    }

    pub fn write_prompt(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        out.write_str(&self.prompt)
    }

    /// Handle one line received from the session in `slot`.
    ///
    /// `line` normally ends in its terminator. Output, including the next
    /// prompt, goes to `out`.
    pub fn dispatch(
        &self,
        slot: usize,
        display_name: &mut Option<String>,
        out: &mut dyn fmt::Write,
        line: &[u8],
    ) -> Result<Outcome, fmt::Error> {
        if is_blank(line) {
            self.commands.write_usage(out)?;
            self.write_prompt(out)?;
            return Ok(Outcome::Continue);
        }

        let token = match command_token(line) {
            Ok(token) => token,
            Err(e) => {
                debug!(slot, error = %e, "Rejected command line");
                writeln!(out, "{e}")?;
                self.write_prompt(out)?;
                return Ok(Outcome::Continue);
            }
        };
        let name = String::from_utf8_lossy(token);

        let Some(command) = self.commands.lookup(token) else {
            writeln!(out, "command {name} not found")?;
            self.commands.write_usage(out)?;
            self.write_prompt(out)?;
            return Ok(Outcome::Continue);
        };

        let Some(handler) = command.handler() else {
            writeln!(out, "command {name} callback not found")?;
            self.write_prompt(out)?;
            return Ok(Outcome::Continue);
        };

        let text = String::from_utf8_lossy(line);
        let argv = parse_args(&text);
        debug!(slot, command = command.name(), argc = argv.len(), "Dispatching command");

        let mut ctx = CommandContext::new(slot, display_name, &self.commands);
        let status = handler.call(&mut ctx, out, &argv);

        match Outcome::from_status(status) {
            Outcome::Continue => {
                self.write_prompt(out)?;
                Ok(Outcome::Continue)
            }
            Outcome::Close => {
                debug!(slot, command = command.name(), status, "Command closed session");
                Ok(Outcome::Close)
            }
        }
    }
}

/// A line holding nothing but its terminator.
pub fn is_blank(line: &[u8]) -> bool {
    matches!(line, b"\r\n" | b"\n" | b"\r")
}

/// The command name: everything up to the first space, or up to the line
/// terminator when there is no space.
///
/// A line that does not end in its terminator was cut short by the line
/// buffer and is rejected as a whole.
pub fn command_token(line: &[u8]) -> Result<&[u8], ShellError> {
    if !matches!(line.last(), Some(b'\r' | b'\n')) {
        return Err(ShellError::Malformed);
    }
    line.iter()
        .position(|&b| b == b' ')
        .or_else(|| line.iter().position(|&b| b == b'\r' || b == b'\n'))
        .map(|end| &line[..end])
        .ok_or(ShellError::Malformed)
}

/// Split a command line on runs of whitespace. No quoting.
pub fn parse_args(line: &str) -> Vec<&str> {
    line.split_ascii_whitespace().collect()
}
