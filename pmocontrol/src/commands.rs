//! Commands accepted by each kind of instance, and their replies.

use std::fmt;

use async_trait::async_trait;
use pmosource::{PlaylistSource, QueueSource};

use crate::errors::{ControlError, Result};

/// Reply of commands that only acknowledge.
pub const OK: &str = "OK";

/// Kind of a controllable instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Playlist,
    Queue,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKind::Playlist => f.write_str("playlist"),
            InstanceKind::Queue => f.write_str("queue"),
        }
    }
}

/// One line of the `help` output.
#[derive(Debug, Clone, Copy)]
pub struct CommandHelp {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

const PLAYLIST_COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "skip",
        usage: "",
        description: "Skip the current item.",
    },
    CommandHelp {
        name: "reload",
        usage: "",
        description: "Reload the playlist, unless already loading.",
    },
    CommandHelp {
        name: "uri",
        usage: "[<uri>]",
        description: "Print the playlist uri, or set it and reload.",
    },
    CommandHelp {
        name: "next",
        usage: "",
        description: "List the ids of the prefetched items.",
    },
];

const QUEUE_COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "skip",
        usage: "",
        description: "Skip the current item.",
    },
    CommandHelp {
        name: "push",
        usage: "<uri>",
        description: "Append an item and print its id.",
    },
    CommandHelp {
        name: "queue",
        usage: "",
        description: "List the ids of the pending items.",
    },
];

/// A parsed command, before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Skip,
    Reload,
    Uri(Option<String>),
    Next,
    Push(String),
    Queue,
}

impl Command {
    /// Parses a command name and its (possibly empty) argument string.
    pub fn parse(id: &str, name: &str, args: &str) -> Result<Self> {
        let args = args.trim();
        let arg = (!args.is_empty()).then(|| args.to_string());

        match name {
            "skip" => Ok(Command::Skip),
            "reload" => Ok(Command::Reload),
            "uri" => Ok(Command::Uri(arg)),
            "next" => Ok(Command::Next),
            "push" => arg.map(Command::Push).ok_or(ControlError::MissingArgument("push")),
            "queue" => Ok(Command::Queue),
            _ => Err(ControlError::unknown_command(id, name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Skip => "skip",
            Command::Reload => "reload",
            Command::Uri(_) => "uri",
            Command::Next => "next",
            Command::Push(_) => "push",
            Command::Queue => "queue",
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(" ")
}

/// An instance reachable from the control surface.
#[async_trait]
pub trait Controllable: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> InstanceKind;

    fn commands(&self) -> &'static [CommandHelp];

    /// Runs `command` and returns the reply line.
    async fn execute(&self, command: Command) -> Result<String>;

    /// Registers a hook run when the instance shuts down.
    fn on_shutdown(&self, hook: Box<dyn Fn() + Send + Sync>);
}

#[async_trait]
impl Controllable for PlaylistSource {
    fn id(&self) -> &str {
        PlaylistSource::id(self)
    }

    fn kind(&self) -> InstanceKind {
        InstanceKind::Playlist
    }

    fn commands(&self) -> &'static [CommandHelp] {
        PLAYLIST_COMMANDS
    }

    async fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Skip => {
                self.skip();
                Ok(OK.to_string())
            }
            Command::Reload => {
                self.reload().await;
                Ok(OK.to_string())
            }
            Command::Uri(None) => Ok(self.uri()),
            Command::Uri(Some(uri)) => {
                self.set_uri(uri).await;
                Ok(OK.to_string())
            }
            Command::Next => Ok(join_ids(&self.pending_ids())),
            other => Err(ControlError::unknown_command(
                PlaylistSource::id(self),
                other.name(),
            )),
        }
    }

    fn on_shutdown(&self, hook: Box<dyn Fn() + Send + Sync>) {
        PlaylistSource::on_shutdown(self, hook)
    }
}

#[async_trait]
impl Controllable for QueueSource {
    fn id(&self) -> &str {
        QueueSource::id(self)
    }

    fn kind(&self) -> InstanceKind {
        InstanceKind::Queue
    }

    fn commands(&self) -> &'static [CommandHelp] {
        QUEUE_COMMANDS
    }

    async fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Skip => {
                self.skip();
                Ok(OK.to_string())
            }
            Command::Push(uri) => Ok(self.push(&uri)?.to_string()),
            Command::Queue => Ok(join_ids(&self.queue_ids())),
            other => Err(ControlError::unknown_command(
                QueueSource::id(self),
                other.name(),
            )),
        }
    }

    fn on_shutdown(&self, hook: Box<dyn Fn() + Send + Sync>) {
        QueueSource::on_shutdown(self, hook)
    }
}
