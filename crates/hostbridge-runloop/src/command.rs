//! Command and task identifier types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Length of generated task ids.
const TASK_ID_LEN: usize = 12;

/// Opaque task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(TASK_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Arguments as supplied by a caller, before shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    /// Values in parameter order.
    Positional(Vec<Value>),
    /// Values keyed by parameter name.
    Named(Map<String, Value>),
}

impl Default for CommandArgs {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl From<Vec<Value>> for CommandArgs {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<Map<String, Value>> for CommandArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self::Named(map)
    }
}

/// A command submission: a registered name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: String,

    #[serde(default)]
    pub arguments: CommandArgs,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: CommandArgs::default(),
        }
    }

    pub fn with_args(mut self, args: impl Into<CommandArgs>) -> Self {
        self.arguments = args.into();
        self
    }

    /// Parse a JSON request body.
    ///
    /// Accepts `{"name": .., "arguments": [..] | {..}}` as well as the flat
    /// form `{"command": .., "<param>": ..}` where every other key is a
    /// named argument.
    pub fn from_json(body: Value) -> BridgeResult<Self> {
        let Value::Object(mut map) = body else {
            return Err(BridgeError::MalformedRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        let name = match map.remove("name").or_else(|| map.remove("command")) {
            Some(Value::String(name)) if !name.is_empty() => name,
            Some(_) => {
                return Err(BridgeError::MalformedRequest(
                    "command name must be a non-empty string".to_string(),
                ));
            }
            None => {
                return Err(BridgeError::MalformedRequest(
                    "missing command name".to_string(),
                ));
            }
        };

        let arguments = match map.remove("arguments") {
            Some(Value::Array(values)) => CommandArgs::Positional(values),
            Some(Value::Object(named)) => CommandArgs::Named(named),
            Some(Value::Null) | None if map.is_empty() => CommandArgs::default(),
            Some(Value::Null) | None => CommandArgs::Named(map),
            Some(other) => CommandArgs::Positional(vec![other]),
        };

        Ok(Self { name, arguments })
    }
}

/// A command after its arguments were shaped for the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub arguments: Vec<Value>,
    pub submitted_at: DateTime<Utc>,
}

impl Command {
    pub fn new(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
