//! Slash commands understood by the interactive loop.

use std::fmt;
use std::path::PathBuf;

/// A parsed `/command` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    History,
    Health,
    Stats,
    Upload(PathBuf),
    Reindex,
    Help,
    Quit,
}

/// Why a command line was not understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingArgument(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(name) => write!(f, "unknown command /{} (try /help)", name),
            CommandError::MissingArgument(usage) => write!(f, "usage: {}", usage),
        }
    }
}

pub const HELP: &str = "\
/clear            clear the conversation
/history          show the conversation so far
/health           check the chat service
/stats            show indexed document counts
/upload <file>    upload a PDF for indexing
/reindex          rebuild the document index
/quit             exit
Ctrl-C cancels a reply in progress.";

impl Command {
    /// Parse a line that starts with `/`. Returns `None` for plain messages.
    pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
        let rest = line.trim().strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "clear" => Ok(Command::Clear),
            "history" => Ok(Command::History),
            "health" => Ok(Command::Health),
            "stats" => Ok(Command::Stats),
            "reindex" => Ok(Command::Reindex),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "upload" if arg.is_empty() => Err(CommandError::MissingArgument("/upload <file.pdf>")),
            "upload" => Ok(Command::Upload(PathBuf::from(arg))),
            other => Err(CommandError::Unknown(other.to_string())),
        };
        Some(command)
    }
}
