//! Text command parsing.
//!
//! Grammar:
//! ```text
//! <agent>: send <pdu-name> to <peer> [key=value | key="value" | key='value']...
//! help
//! quit
//! ```

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::pdu::CommandId;

/// A structured user instruction for the standard application.
#[derive(Debug, Clone)]
pub enum UserCommand {
    SendPdu(SendPduDetails),
    Help,
    Quit,
}

#[derive(Debug, Clone)]
pub struct SendPduDetails {
    pub sending_agent: String,
    pub receiving_peer: String,
    pub command_id: CommandId,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("invalid smpp PDU type name ({0})")]
    UnknownPduType(String),

    #[error("command not understood")]
    Unrecognized,
}

pub struct TextCommandParser {
    help: Regex,
    quit: Regex,
    send: Regex,
    empty_last_param: Regex,
    empty_param: Regex,
    double_quoted_param: Regex,
    single_quoted_param: Regex,
    unquoted_param: Regex,
}

impl TextCommandParser {
    pub fn new() -> Self {
        Self {
            help: Regex::new(r"^help$").unwrap(),
            quit: Regex::new(r"^quit$").unwrap(),
            send: Regex::new(r"^(\S+?): send (\S+) to (\S+) *(.*)?$").unwrap(),
            empty_last_param: Regex::new(r"^(\S+)=$").unwrap(),
            empty_param: Regex::new(r"^(\S+)=\s+").unwrap(),
            double_quoted_param: Regex::new(r#"^(\S+)="(.+?)"\s*"#).unwrap(),
            single_quoted_param: Regex::new(r"^(\S+)='(.+?)'\s*").unwrap(),
            unquoted_param: Regex::new(r"^(\S+)=(\S+)\s*").unwrap(),
        }
    }

    /// Parse one input line into a `UserCommand`.
    pub fn parse(&self, line: &str) -> Result<UserCommand, CommandParseError> {
        if self.quit.is_match(line) {
            return Ok(UserCommand::Quit);
        }

        if self.help.is_match(line) {
            return Ok(UserCommand::Help);
        }

        if let Some(groups) = self.send.captures(line) {
            let pdu_name = groups.get(2).map_or("", |m| m.as_str());
            let command_id = CommandId::from_name(pdu_name)
                .ok_or_else(|| CommandParseError::UnknownPduType(pdu_name.to_string()))?;

            return Ok(UserCommand::SendPdu(SendPduDetails {
                sending_agent: groups.get(1).map_or("", |m| m.as_str()).to_string(),
                receiving_peer: groups.get(3).map_or("", |m| m.as_str()).to_string(),
                command_id,
                params: self.parameter_map(groups.get(4).map_or("", |m| m.as_str())),
            }));
        }

        Err(CommandParseError::Unrecognized)
    }

    fn parameter_map(&self, mut rest: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        while !rest.is_empty() {
            let matchers = [
                &self.empty_last_param,
                &self.empty_param,
                &self.double_quoted_param,
                &self.single_quoted_param,
                &self.unquoted_param,
            ];

            let mut matched = false;
            for matcher in matchers {
                if let Some(groups) = matcher.captures(rest) {
                    let name = groups.get(1).map_or("", |m| m.as_str()).to_string();
                    let value = groups.get(2).map_or("", |m| m.as_str()).to_string();
                    params.insert(name, value);
                    rest = &rest[groups.get(0).map_or(0, |m| m.as_str().len())..];
                    matched = true;
                    break;
                }
            }

            if !matched {
                break;
            }
        }

        params
    }
}

impl Default for TextCommandParser {
    fn default() -> Self {
        Self::new()
    }
}
