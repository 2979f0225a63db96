//! Command registration.
//!
//! A [`CommandTable`] is an ordered list of descriptors built once by the
//! embedding application. Order matters: lookup returns the first match.

use super::ShellError;
use std::fmt;

/// Behaviour behind a shell command.
///
/// Returns a status code: `0` keeps the session open, anything else closes
/// it.
pub trait CommandHandler: Send {
    fn call(&self, ctx: &mut CommandContext<'_>, out: &mut dyn fmt::Write, argv: &[&str]) -> i32;
}

/// Adapter letting plain functions and closures act as handlers.
struct FnHandler<F>(F);

impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(&mut CommandContext<'_>, &mut dyn fmt::Write, &[&str]) -> i32 + Send,
{
    fn call(&self, ctx: &mut CommandContext<'_>, out: &mut dyn fmt::Write, argv: &[&str]) -> i32 {
        (self.0)(ctx, out, argv)
    }
}

/// One registered command.
pub struct CommandDescriptor {
    name: String,
    description: Option<String>,
    handler: Option<Box<dyn CommandHandler>>,
}

impl CommandDescriptor {
    /// Command backed by a function or closure.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut CommandContext<'_>, &mut dyn fmt::Write, &[&str]) -> i32 + Send + 'static,
    {
        Self::with_handler(name, FnHandler(handler))
    }

    /// Command backed by a [`CommandHandler`] implementation.
    pub fn with_handler(name: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            handler: Some(Box::new(handler)),
        }
    }

    /// Listed in the usage text but has no behaviour attached.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            handler: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn handler(&self) -> Option<&dyn CommandHandler> {
        self.handler.as_deref()
    }

    /// Whether `token` selects this command.
    ///
    /// Only the first `name.len()` bytes of the token are compared, so
    /// `"helpme"` selects `"help"`. Case-sensitive.
    pub fn matches(&self, token: &[u8]) -> bool {
        token.starts_with(self.name.as_bytes())
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Ordered, read-only-after-startup list of commands.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<CommandDescriptor>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command. Names must be non-empty.
    pub fn register(&mut self, command: CommandDescriptor) -> Result<(), ShellError> {
        if command.name.is_empty() {
            return Err(ShellError::EmptyName);
        }
        self.commands.push(command);
        Ok(())
    }

    /// First command, in registration order, that matches `token`.
    pub fn lookup(&self, token: &[u8]) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|c| c.matches(token))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Write the usage listing: every command with its description.
    pub fn write_usage(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        out.write_str("\nUsage: <cmd> <args>\n")?;
        for command in &self.commands {
            writeln!(out, " {} {}", command.name, command.description().unwrap_or(""))?;
        }
        Ok(())
    }
}

/// What a handler may see and change about the session that invoked it.
pub struct CommandContext<'a> {
    slot: usize,
    display_name: &'a mut Option<String>,
    commands: &'a CommandTable,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        slot: usize,
        display_name: &'a mut Option<String>,
        commands: &'a CommandTable,
    ) -> Self {
        Self {
            slot,
            display_name,
            commands,
        }
    }

    /// Index of the session in the connection table.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Give the session a name. Named sessions announce their departure to
    /// everyone else.
    pub fn bind_name(&mut self, name: impl Into<String>) {
        *self.display_name = Some(name.into());
    }

    pub fn commands(&self) -> &CommandTable {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CommandContext<'_>, _: &mut dyn fmt::Write, _: &[&str]) -> i32 {
        0
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut table = CommandTable::new();
        assert!(matches!(
            table.register(CommandDescriptor::new("", noop)),
            Err(ShellError::EmptyName)
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_lookup_is_prefix_based_and_ordered() {
        let mut table = CommandTable::new();
        table.register(CommandDescriptor::new("help", noop)).unwrap();
        table.register(CommandDescriptor::new("he", noop)).unwrap();
        table.register(CommandDescriptor::unbound("hel")).unwrap();

        assert_eq!(table.lookup(b"help").unwrap().name(), "help");
        assert_eq!(table.lookup(b"helper").unwrap().name(), "help");
        assert_eq!(table.lookup(b"helpXYZ").unwrap().name(), "help");
        // "hel" is shorter than "help", so the next entry wins
        assert_eq!(table.lookup(b"hel").unwrap().name(), "he");
        assert!(table.lookup(b"HELP").is_none());
        assert!(table.lookup(b"h").is_none());
    }

    #[test]
    fn test_usage_lists_descriptions() {
        let mut table = CommandTable::new();
        table.register(CommandDescriptor::new("help", noop)).unwrap();
        table
            .register(CommandDescriptor::new("test", noop).describe("[options]"))
            .unwrap();

        let mut out = String::new();
        table.write_usage(&mut out).unwrap();
        assert_eq!(out, "\nUsage: <cmd> <args>\n help \n test [options]\n");
    }

    #[test]
    fn test_context_binds_name() {
        let table = CommandTable::new();
        let mut name = None;
        let mut ctx = CommandContext::new(3, &mut name, &table);
        assert_eq!(ctx.slot(), 3);
        assert!(ctx.display_name().is_none());
        ctx.bind_name("alice");
        assert_eq!(ctx.display_name(), Some("alice"));
        assert_eq!(name.as_deref(), Some("alice"));
    }
}
