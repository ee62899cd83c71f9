//! Slash commands understood by the chat REPL.

use thiserror::Error;

/// Every command, as offered by completion and `/help`.
pub const COMMANDS: [(&str, &str); 10] = [
    ("/models", "list running models"),
    ("/model", "<id>  switch to a running model"),
    ("/temperature", "<0.0-1.0>  set the sampling temperature"),
    ("/max-tokens", "<100-2000>  set the response length limit"),
    ("/top-p", "<0.1-1.0>  set nucleus sampling"),
    ("/system", "<prompt>  replace the system prompt"),
    ("/params", "show the current model and parameters"),
    ("/stats", "show usage statistics for this session"),
    ("/metrics", "show backend usage metrics"),
    ("/help", "show this help"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Models,
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
    TopP(f32),
    System(String),
    Params,
    Stats,
    Metrics,
    Help,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (type /help)")]
    Unknown(String),

    #[error("Usage: {usage}")]
    MissingArgument { usage: String },

    #[error("Invalid value for {command}: {value}")]
    InvalidValue { command: String, value: String },
}

impl ReplCommand {
    /// Parses a line starting with `/`. Returns `None` for chat input.
    pub fn parse(line: &str) -> Option<Result<Self, CommandError>> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }

        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        Some(Self::from_parts(name, argument))
    }

    fn from_parts(name: &str, argument: &str) -> Result<Self, CommandError> {
        match name {
            "/models" => Ok(ReplCommand::Models),
            "/model" => required(name, argument).map(|id| ReplCommand::Model(id.to_string())),
            "/temperature" => parse_value(name, argument).map(ReplCommand::Temperature),
            "/max-tokens" => parse_value(name, argument).map(ReplCommand::MaxTokens),
            "/top-p" => parse_value(name, argument).map(ReplCommand::TopP),
            "/system" => required(name, argument).map(|p| ReplCommand::System(p.to_string())),
            "/params" => Ok(ReplCommand::Params),
            "/stats" => Ok(ReplCommand::Stats),
            "/metrics" => Ok(ReplCommand::Metrics),
            "/help" => Ok(ReplCommand::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn usage(name: &str) -> String {
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(command, help)| format!("{command} {help}"))
        .unwrap_or_else(|| name.to_string())
}

fn required<'a>(name: &str, argument: &'a str) -> Result<&'a str, CommandError> {
    if argument.is_empty() {
        Err(CommandError::MissingArgument { usage: usage(name) })
    } else {
        Ok(argument)
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, argument: &str) -> Result<T, CommandError> {
    required(name, argument)?
        .parse()
        .map_err(|_| CommandError::InvalidValue {
            command: name.to_string(),
            value: argument.to_string(),
        })
}
