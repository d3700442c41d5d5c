use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Empty command")]
    EmptyCommand,
    #[error("Malformed command '{0}', expected <id>.<command> [args]")]
    Malformed(String),
    #[error("No such instance: {0}")]
    UnknownInstance(String),
    #[error("Unknown command '{command}' for {id}")]
    UnknownCommand { id: String, command: String },
    #[error("Command {0} requires an argument")]
    MissingArgument(&'static str),
    #[error("Instance {0} is already registered")]
    AlreadyRegistered(String),
    #[error(transparent)]
    Source(#[from] pmosource::SourceError),
}

impl ControlError {
    pub fn unknown_command(id: &str, command: &str) -> Self {
        ControlError::UnknownCommand {
            id: id.to_string(),
            command: command.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;
