//! Commands and the message shapes exchanged over RPC and HTTP.

use crate::error::{BotioError, Result};
use serde::{Deserialize, Serialize};

/// A trigger phrase and its canned response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub response: String,
}

impl Command {
    pub fn new(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: response.into(),
        }
    }

    /// Reject commands with an empty name or response.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.response.is_empty() {
            return Err(BotioError::invalid_argument(
                "response",
                "command's response cannot be an empty string",
            ));
        }
        Ok(())
    }
}

/// Reject an empty command name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BotioError::invalid_argument(
            "name",
            "command cannot be an empty string",
        ));
    }
    Ok(())
}

/// Reference to a command by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRef {
    #[serde(default)]
    pub name: String,
}

impl CommandRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Response text of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub text: String,
}

/// A command together with its response, as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    #[serde(default)]
    pub cmd: CommandRef,
    #[serde(default)]
    pub resp: Response,
}

impl BotCommand {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            cmd: CommandRef::new(name),
            resp: Response { text: text.into() },
        }
    }

    pub fn name(&self) -> &str {
        &self.cmd.name
    }

    pub fn text(&self) -> &str {
        &self.resp.text
    }
}

impl From<Command> for BotCommand {
    fn from(command: Command) -> Self {
        BotCommand::new(command.name, command.response)
    }
}

impl From<BotCommand> for Command {
    fn from(bot_command: BotCommand) -> Self {
        Command::new(bot_command.cmd.name, bot_command.resp.text)
    }
}

/// List of commands returned by `ListCommands`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommands {
    #[serde(default)]
    pub items: Vec<BotCommand>,
}

impl From<Vec<Command>> for BotCommands {
    fn from(commands: Vec<Command>) -> Self {
        Self {
            items: commands.into_iter().map(BotCommand::from).collect(),
        }
    }
}

/// Empty request/response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// A reply waiting to be sent to a chat destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResponse {
    pub destination_id: String,
    pub text: String,
}

impl PendingResponse {
    pub fn new(destination_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            destination_id: destination_id.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_validate_rejects_empty_fields() {
        let err = Command::new("", "hi").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("name"));

        let err = Command::new("start", "").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("response"));

        assert!(Command::new("start", "hi").validate().is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(BotCommand::new("start", "hi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cmd": {"name": "start"}, "resp": {"text": "hi"}})
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let parsed: BotCommand = serde_json::from_value(serde_json::json!({"cmd": {}})).unwrap();
        assert_eq!(parsed.name(), "");
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn test_bot_commands_from_commands() {
        let list = BotCommands::from(vec![Command::new("a", "1"), Command::new("b", "2")]);
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[1].name(), "b");
        assert_eq!(Command::from(list.items[0].clone()), Command::new("a", "1"));
    }
}
