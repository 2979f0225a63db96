//! Stock commands shipped with the server binary.

use super::command::{CommandContext, CommandDescriptor, CommandTable};
use super::ShellError;
use std::fmt;

/// Print the usage listing.
pub fn help(ctx: &mut CommandContext<'_>, out: &mut dyn fmt::Write, _argv: &[&str]) -> i32 {
    let _ = ctx.commands().write_usage(out);
    0
}

/// End the session.
pub fn quit(_ctx: &mut CommandContext<'_>, _out: &mut dyn fmt::Write, _argv: &[&str]) -> i32 {
    -1
}

/// Echo the argument vector back, one entry per line.
pub fn test(_ctx: &mut CommandContext<'_>, out: &mut dyn fmt::Write, argv: &[&str]) -> i32 {
    for (i, arg) in argv.iter().enumerate() {
        let _ = writeln!(out, "argv[{i}] {arg}");
    }
    let _ = writeln!(out, "result {}", 0);
    0
}

/// Table holding `help`, `quit` and `test`, in that order.
pub fn commands() -> Result<CommandTable, ShellError> {
    let mut table = CommandTable::new();
    table.register(CommandDescriptor::new("help", help))?;
    table.register(CommandDescriptor::new("quit", quit))?;
    table.register(CommandDescriptor::new("test", test).describe("[options]"))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Outcome, Shell};

    fn run(line: &[u8]) -> (Outcome, String) {
        let shell = Shell::new(commands().unwrap(), "==> ");
        let mut name = None;
        let mut out = String::new();
        let outcome = shell.dispatch(0, &mut name, &mut out, line).unwrap();
        (outcome, out)
    }

    #[test]
    fn test_help() {
        let (outcome, out) = run(b"help\r\n");
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(
            out,
            "\nUsage: <cmd> <args>\n help \n quit \n test [options]\n==> "
        );
    }

    #[test]
    fn test_quit() {
        let (outcome, out) = run(b"quit\r\n");
        assert_eq!(outcome, Outcome::Close);
        assert!(out.is_empty());
    }

    #[test]
    fn test_test_prints_argv() {
        let (outcome, out) = run(b"test a b  c\r\n");
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(
            out,
            "argv[0] test\nargv[1] a\nargv[2] b\nargv[3] c\nresult 0\n==> "
        );
    }
}
