//! # Command lines for externally supplied programs.
//!
//! [`CommandLine`] is how launchers and checks describe the program they run:
//! either an argv vector executed directly, or a script handed to `sh -c`.

use std::fmt;

use tokio::process::Command;

/// Program invocation in exec or shell form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandLine {
    /// `argv[0]` is the program, the rest are its arguments.
    Exec(Vec<String>),
    /// Script run with `sh -c`.
    Shell(String),
}

impl CommandLine {
    /// Exec form from anything iterable.
    pub fn exec<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Exec(argv.into_iter().map(Into::into).collect())
    }

    /// Shell form.
    pub fn shell(script: impl Into<String>) -> Self {
        CommandLine::Shell(script.into())
    }

    /// True when there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Exec(argv) => argv.first().map_or(true, |p| p.trim().is_empty()),
            CommandLine::Shell(script) => script.trim().is_empty(),
        }
    }

    /// Name of the program that will be spawned (for error messages).
    pub fn program(&self) -> &str {
        match self {
            CommandLine::Exec(argv) => argv.first().map(String::as_str).unwrap_or(""),
            CommandLine::Shell(_) => "sh",
        }
    }

    /// Builds a `tokio::process::Command` for this line.
    pub(crate) fn to_command(&self) -> Command {
        match self {
            CommandLine::Exec(argv) => {
                let mut cmd = Command::new(argv.first().map(String::as_str).unwrap_or(""));
                cmd.args(argv.iter().skip(1));
                cmd
            }
            CommandLine::Shell(script) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Exec(argv) => write!(f, "{}", argv.join(" ")),
            CommandLine::Shell(script) => write!(f, "sh -c {script:?}"),
        }
    }
}
