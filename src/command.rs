//! Commands shared by services and build stages

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};

/// A command in shell or exec form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Shell command string
    Shell(String),
    /// Exec form array
    Exec(Vec<String>),
}

impl Command {
    /// Exec form from anything iterable
    pub fn exec<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Exec(args.into_iter().map(Into::into).collect())
    }

    /// Reject empty commands
    pub fn validate(&self, field: &str) -> Result<()> {
        let empty = match self {
            Command::Shell(cmd) => cmd.trim().is_empty(),
            Command::Exec(args) => args.is_empty() || args[0].trim().is_empty(),
        };
        if empty {
            return Err(StackError::missing(field, "command"));
        }
        Ok(())
    }
}

impl From<&str> for Command {
    fn from(cmd: &str) -> Self {
        Command::Shell(cmd.to_string())
    }
}

impl From<String> for Command {
    fn from(cmd: String) -> Self {
        Command::Shell(cmd)
    }
}

impl From<Vec<String>> for Command {
    fn from(args: Vec<String>) -> Self {
        Command::Exec(args)
    }
}

impl<const N: usize> From<[&str; N]> for Command {
    fn from(args: [&str; N]) -> Self {
        Command::exec(args)
    }
}
